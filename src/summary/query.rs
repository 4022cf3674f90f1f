use crate::duck::table_columns;
use crate::error::EtlError;
use anyhow::Result;
use duckdb::Connection;
use tracing::debug;

/// Freight per vendor, sales per (vendor, brand) and priced purchases per
/// (vendor, brand, description, price, volume), joined onto the purchase
/// side. Sums are materialised as DOUBLE.
pub const VENDOR_SUMMARY_SQL: &str = r#"
WITH FreightSummary AS (
    SELECT
        VendorNumber,
        CAST(SUM(Freight) AS DOUBLE) AS FreightCost
    FROM vendor_invoice
    GROUP BY VendorNumber
),

SalesSummary AS (
    SELECT
        VendorNo,
        Brand,
        CAST(SUM(SalesQuantity) AS DOUBLE) AS TotalSalesQuantity,
        CAST(SUM(SalesDollars) AS DOUBLE) AS TotalSalesDollars,
        CAST(SUM(SalesPrice) AS DOUBLE) AS TotalSalesPrice,
        CAST(SUM(ExciseTax) AS DOUBLE) AS TotalExciseTax
    FROM sales
    GROUP BY VendorNo, Brand
),

PurchaseSummary AS (
    SELECT
        p.VendorNumber,
        p.VendorName,
        p.Description,
        p.Brand,
        p.PurchasePrice,
        pp.Price AS ActualPrice,
        pp.Volume,
        CAST(SUM(p.Quantity) AS DOUBLE) AS TotalPurchaseQuantity,
        CAST(SUM(p.Dollars) AS DOUBLE) AS TotalPurchaseDollars
    FROM purchases p
    JOIN purchase_prices pp
        ON p.Brand = pp.Brand
    WHERE p.PurchasePrice > 0
    GROUP BY
        p.VendorNumber, p.VendorName, p.Brand, p.Description,
        p.PurchasePrice, pp.Price, pp.Volume
)

SELECT
    ps.VendorNumber,
    ps.VendorName,
    ps.Brand,
    ps.Description,
    ps.PurchasePrice,
    ps.ActualPrice,
    ps.Volume,
    ps.TotalPurchaseQuantity,
    ps.TotalPurchaseDollars,
    ss.TotalSalesQuantity,
    ss.TotalSalesPrice,
    ss.TotalSalesDollars,
    ss.TotalExciseTax,
    fs.FreightCost
FROM PurchaseSummary ps
LEFT JOIN SalesSummary ss
    ON ps.VendorNumber = ss.VendorNo AND ps.Brand = ss.Brand
LEFT JOIN FreightSummary fs
    ON ps.VendorNumber = fs.VendorNumber
ORDER BY ps.TotalPurchaseDollars DESC
"#;

/// Base tables the summary query reads, with the columns it touches.
pub const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("vendor_invoice", &["VendorNumber", "Freight"]),
    (
        "sales",
        &["VendorNo", "Brand", "SalesQuantity", "SalesDollars", "SalesPrice", "ExciseTax"],
    ),
    (
        "purchases",
        &[
            "VendorNumber",
            "VendorName",
            "Brand",
            "Description",
            "PurchasePrice",
            "Quantity",
            "Dollars",
        ],
    ),
    ("purchase_prices", &["Brand", "Price", "Volume"]),
];

/// Fail fast with `MissingTable` / `MissingColumn` before running the query.
pub fn check_base_tables(conn: &Connection) -> Result<()> {
    for (table, required) in REQUIRED_COLUMNS {
        let present = table_columns(conn, table)?
            .ok_or_else(|| EtlError::MissingTable(table.to_string()))?;
        for column in required.iter() {
            if !present.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(EtlError::MissingColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                }
                .into());
            }
        }
        debug!(table = %table, columns = present.len(), "base table present");
    }
    Ok(())
}
