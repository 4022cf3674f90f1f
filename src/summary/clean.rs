use crate::config::TextNullFill;
use crate::error::EtlError;
use anyhow::{Context, Result};
use arrow::array::{
    Array, ArrayRef, ArrowPrimitiveType, AsArray, BooleanArray, Float64Array, PrimitiveArray,
    StringArray,
};
use arrow::compute::kernels::arity::binary;
use arrow::compute::kernels::cast::{cast, cast_with_options, CastOptions};
use arrow::datatypes::{
    DataType, Decimal128Type, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, Schema as ArrowSchema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

pub const VOLUME: &str = "Volume";
pub const VENDOR_NAME: &str = "VendorName";
pub const DESCRIPTION: &str = "Description";

pub const GROSS_PROFIT: &str = "GrossProfit";
pub const PROFIT_MARGIN: &str = "ProfitMargin";
pub const STOCK_TURNOVER: &str = "StockTurnover";
pub const SALES_TO_PURCHASE_RATIO: &str = "SalestoPurchaseRatio";

/// Full cleaning pass over one batch of the raw summary.
pub fn clean_batch(batch: &RecordBatch, text_nulls: TextNullFill) -> Result<RecordBatch> {
    let batch = normalize_strings(batch)?;
    let batch = coerce_to_float(&batch, VOLUME)?;
    let batch = fill_nulls(&batch, text_nulls)?;
    let batch = apply_trimming(&batch, &[VENDOR_NAME, DESCRIPTION])?;
    derive_metrics(&batch)
}

fn column_index(batch: &RecordBatch, name: &str) -> Result<usize> {
    batch
        .schema()
        .index_of(name)
        .map_err(|_| {
            anyhow::Error::from(EtlError::MissingColumn {
                table: "vendor summary".to_string(),
                column: name.to_string(),
            })
        })
}

fn replace_column(batch: &RecordBatch, idx: usize, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let name = fields[idx].name().clone();
    fields[idx] = Field::new(name, array.data_type().clone(), true);
    let mut columns = batch.columns().to_vec();
    columns[idx] = array;
    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns).map_err(Into::into)
}

/// Utf8View and LargeUtf8 columns become plain Utf8.
fn normalize_strings(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut out = batch.clone();
    for idx in 0..batch.num_columns() {
        if matches!(
            batch.column(idx).data_type(),
            DataType::Utf8View | DataType::LargeUtf8
        ) {
            let utf8 = cast(batch.column(idx), &DataType::Utf8)?;
            out = replace_column(&out, idx, utf8)?;
        }
    }
    Ok(out)
}

/// Coerce `column` to nullable Float64. A value that does not parse is an
/// error, not a null.
pub fn coerce_to_float(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let idx = column_index(batch, column)?;
    let opts = CastOptions {
        safe: false,
        ..Default::default()
    };
    let coerced = cast_with_options(batch.column(idx), &DataType::Float64, &opts)
        .with_context(|| format!("coercing `{}` to DOUBLE", column))?;
    replace_column(batch, idx, coerced)
}

fn zero_fill<T: ArrowPrimitiveType>(array: &ArrayRef) -> ArrayRef {
    let arr = array.as_primitive::<T>();
    let filled: PrimitiveArray<T> = arr.iter().map(|v| Some(v.unwrap_or_default())).collect();
    Arc::new(filled.with_data_type(arr.data_type().clone()))
}

/// Replace nulls in one column: numbers become zero, booleans false, text
/// per `text_nulls`.
pub fn fill_column(array: &ArrayRef, name: &str, text_nulls: TextNullFill) -> Result<ArrayRef> {
    if array.null_count() == 0 {
        return Ok(array.clone());
    }
    let filled = match array.data_type() {
        DataType::Int8 => zero_fill::<Int8Type>(array),
        DataType::Int16 => zero_fill::<Int16Type>(array),
        DataType::Int32 => zero_fill::<Int32Type>(array),
        DataType::Int64 => zero_fill::<Int64Type>(array),
        DataType::UInt8 => zero_fill::<UInt8Type>(array),
        DataType::UInt16 => zero_fill::<UInt16Type>(array),
        DataType::UInt32 => zero_fill::<UInt32Type>(array),
        DataType::UInt64 => zero_fill::<UInt64Type>(array),
        DataType::Float32 => zero_fill::<Float32Type>(array),
        DataType::Float64 => zero_fill::<Float64Type>(array),
        DataType::Decimal128(_, _) => zero_fill::<Decimal128Type>(array),
        DataType::Boolean => {
            let filled: BooleanArray = array
                .as_boolean()
                .iter()
                .map(|v| Some(v.unwrap_or(false)))
                .collect();
            Arc::new(filled)
        }
        DataType::Utf8 => {
            let fill = text_nulls.value();
            let filled: StringArray = array
                .as_string::<i32>()
                .iter()
                .map(|v| Some(v.unwrap_or(fill)))
                .collect();
            Arc::new(filled)
        }
        other => {
            return Err(EtlError::UnsupportedType {
                column: name.to_string(),
                data_type: other.clone(),
            }
            .into())
        }
    };
    Ok(filled)
}

pub fn fill_nulls(batch: &RecordBatch, text_nulls: TextNullFill) -> Result<RecordBatch> {
    let schema = batch.schema();
    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, arr)| fill_column(arr, field.name(), text_nulls))
        .collect::<Result<Vec<_>>>()?;
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_nullable(true))
        .collect();
    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns).map_err(Into::into)
}

/// Trim surrounding whitespace in the named text columns
pub fn apply_trimming(batch: &RecordBatch, trim_columns: &[&str]) -> Result<RecordBatch> {
    if trim_columns.is_empty() {
        return Ok(batch.clone());
    }

    let schema = batch.schema();
    let mut cols = Vec::with_capacity(batch.num_columns());
    for (i, field) in schema.fields().iter().enumerate() {
        let arr = batch.column(i);
        if trim_columns.contains(&field.name().as_str()) {
            if let Some(sarr) = arr.as_any().downcast_ref::<StringArray>() {
                let trimmed: StringArray = sarr.iter().map(|opt| opt.map(str::trim)).collect();
                cols.push(Arc::new(trimmed) as ArrayRef);
                continue;
            }
        }
        cols.push(arr.clone());
    }

    RecordBatch::try_new(schema, cols).map_err(Into::into)
}

fn float_column(batch: &RecordBatch, name: &str) -> Result<Float64Array> {
    let idx = column_index(batch, name)?;
    let arr = cast(batch.column(idx), &DataType::Float64)
        .with_context(|| format!("reading `{}` as DOUBLE", name))?;
    Ok(arr.as_primitive::<Float64Type>().clone())
}

/// Append GrossProfit, ProfitMargin, StockTurnover and SalestoPurchaseRatio.
/// Division by zero follows IEEE semantics (inf / NaN).
pub fn derive_metrics(batch: &RecordBatch) -> Result<RecordBatch> {
    let sales_dollars = float_column(batch, "TotalSalesDollars")?;
    let purchase_dollars = float_column(batch, "TotalPurchaseDollars")?;
    let sales_qty = float_column(batch, "TotalSalesQuantity")?;
    let purchase_qty = float_column(batch, "TotalPurchaseQuantity")?;

    let gross: Float64Array = binary(&sales_dollars, &purchase_dollars, |s, p| s - p)?;
    let margin: Float64Array = binary(&gross, &sales_dollars, |g, s| g / s * 100.0)?;
    let turnover: Float64Array = binary(&sales_qty, &purchase_qty, |s, p| s / p)?;
    let ratio: Float64Array = binary(&sales_dollars, &purchase_dollars, |s, p| s / p)?;

    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns = batch.columns().to_vec();
    for (name, arr) in [
        (GROSS_PROFIT, gross),
        (PROFIT_MARGIN, margin),
        (STOCK_TURNOVER, turnover),
        (SALES_TO_PURCHASE_RATIO, ratio),
    ] {
        fields.push(Field::new(name, DataType::Float64, true));
        columns.push(Arc::new(arr) as ArrayRef);
    }
    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), columns)
        .context("building cleaned summary batch")
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::array::Int64Array;

    fn raw_batch(volume: Vec<Option<&str>>, name: Vec<Option<&str>>) -> RecordBatch {
        let n = volume.len();
        let schema = Arc::new(ArrowSchema::new(vec![
            Field::new("VendorNumber", DataType::Int64, true),
            Field::new(VENDOR_NAME, DataType::Utf8, true),
            Field::new(DESCRIPTION, DataType::Utf8, true),
            Field::new(VOLUME, DataType::Utf8, true),
            Field::new("TotalPurchaseQuantity", DataType::Float64, true),
            Field::new("TotalPurchaseDollars", DataType::Float64, true),
            Field::new("TotalSalesQuantity", DataType::Float64, true),
            Field::new("TotalSalesDollars", DataType::Float64, true),
        ]));
        let mut vendors: Vec<Option<i64>> = (0..n as i64).map(Some).collect();
        vendors[0] = None;
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(vendors)),
                Arc::new(StringArray::from(name)),
                Arc::new(StringArray::from(vec![Some(" 750mL Red "); n])),
                Arc::new(StringArray::from(volume)),
                Arc::new(Float64Array::from(vec![Some(10.0); n])),
                Arc::new(Float64Array::from(vec![Some(60.0); n])),
                Arc::new(Float64Array::from(vec![None::<f64>; n])),
                Arc::new(Float64Array::from(vec![Some(100.0); n])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn cleans_and_derives() -> Result<()> {
        let batch = raw_batch(vec![Some("750"), None], vec![Some("  Acme  "), None]);
        let out = clean_batch(&batch, TextNullFill::Empty)?;

        assert_eq!(out.num_columns(), batch.num_columns() + 4);
        assert_eq!(out.columns().iter().map(|c| c.null_count()).sum::<usize>(), 0);

        let vendors = out.column_by_name("VendorNumber").unwrap().as_primitive::<Int64Type>();
        assert_eq!(vendors.value(0), 0);

        let volume = out.column_by_name(VOLUME).unwrap().as_primitive::<Float64Type>();
        assert_eq!(volume.value(0), 750.0);
        assert_eq!(volume.value(1), 0.0);

        let names = out.column_by_name(VENDOR_NAME).unwrap().as_string::<i32>();
        assert_eq!(names.value(0), "Acme");
        assert_eq!(names.value(1), "");
        let desc = out.column_by_name(DESCRIPTION).unwrap().as_string::<i32>();
        assert_eq!(desc.value(0), "750mL Red");

        let gross = out.column_by_name(GROSS_PROFIT).unwrap().as_primitive::<Float64Type>();
        let margin = out.column_by_name(PROFIT_MARGIN).unwrap().as_primitive::<Float64Type>();
        let turnover = out.column_by_name(STOCK_TURNOVER).unwrap().as_primitive::<Float64Type>();
        assert_eq!(gross.value(0), 40.0);
        assert_eq!(margin.value(0), 40.0);
        // missing sales quantity was zero-filled before dividing
        assert_eq!(turnover.value(0), 0.0);
        Ok(())
    }

    #[test]
    fn text_nulls_can_mirror_blanket_zero_fill() -> Result<()> {
        let batch = raw_batch(vec![Some("1"), Some("2")], vec![None, Some("x")]);
        let out = fill_nulls(&batch, TextNullFill::Zero)?;
        let names = out.column_by_name(VENDOR_NAME).unwrap().as_string::<i32>();
        assert_eq!(names.value(0), "0");
        assert_eq!(names.value(1), "x");
        Ok(())
    }

    #[test]
    fn unparsable_volume_is_an_error() {
        let batch = raw_batch(vec![Some("Unknown"), Some("750")], vec![Some("a"), Some("b")]);
        assert!(clean_batch(&batch, TextNullFill::Empty).is_err());
    }

    #[test]
    fn division_by_zero_is_not_an_error() -> Result<()> {
        let schema = Arc::new(ArrowSchema::new(vec![
            Field::new("TotalPurchaseQuantity", DataType::Float64, true),
            Field::new("TotalPurchaseDollars", DataType::Float64, true),
            Field::new("TotalSalesQuantity", DataType::Float64, true),
            Field::new("TotalSalesDollars", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Float64Array::from(vec![0.0, 10.0])),
                Arc::new(Float64Array::from(vec![0.0, 60.0])),
                Arc::new(Float64Array::from(vec![5.0, 50.0])),
                Arc::new(Float64Array::from(vec![0.0, 100.0])),
            ],
        )?;
        let out = derive_metrics(&batch)?;
        let turnover = out.column_by_name(STOCK_TURNOVER).unwrap().as_primitive::<Float64Type>();
        let margin = out.column_by_name(PROFIT_MARGIN).unwrap().as_primitive::<Float64Type>();
        let ratio = out.column_by_name(SALES_TO_PURCHASE_RATIO).unwrap().as_primitive::<Float64Type>();
        assert!(turnover.value(0).is_infinite());
        assert!(margin.value(0).is_nan());
        assert!(ratio.value(0).is_nan());
        assert_eq!(turnover.value(1), 5.0);
        Ok(())
    }

    #[test]
    fn unsupported_types_are_reported() {
        let arr: ArrayRef = Arc::new(arrow::array::BinaryArray::from(vec![None, Some(&b"x"[..])]));
        let err = fill_column(&arr, "blob", TextNullFill::Empty).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EtlError>(),
            Some(EtlError::UnsupportedType { .. })
        ));
    }
}
