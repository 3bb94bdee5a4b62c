//! Field extraction from pasted job text

use crate::ExtractionError;
use serde::{Deserialize, Serialize};

/// Maximum number of product lines kept on a worksheet
pub const MAX_PRODUCTS: usize = 10;

/// Name, address, phone, email, one product and the order number
pub const MIN_LINES: usize = 6;

/// Index of the first product line
const FIRST_PRODUCT: usize = 4;

const REFERENCE_PREFIX: &str = "wk";
const ORDER_KEYWORD: &str = "SORD";

/// One worksheet's worth of data, built fresh for every generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub customer_name: String,
    pub address: String,
    pub phone: String,
    pub email: String,
    /// Top to bottom, 1 to [`MAX_PRODUCTS`] entries
    pub products: Vec<String>,
    /// The SORD number
    pub order_number: String,
    /// The WK number, stored in its original case
    #[serde(default)]
    pub reference_number: Option<String>,
}

/// How the end of the product list is found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductBoundary {
    /// The last line is the order number, or the reference number when it
    /// starts with `WK`, in which case the order number precedes it.
    #[default]
    LastLine,
    /// Products run until a line mentions `SORD` or the next line starts
    /// with `WK`. Misfires when a product description contains either token.
    KeywordScan,
}

struct Split<'a> {
    products: Vec<&'a str>,
    order: &'a str,
    reference: Option<&'a str>,
}

fn has_reference_prefix(line: &str) -> bool {
    line.trim_start()
        .get(..REFERENCE_PREFIX.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(REFERENCE_PREFIX))
}

fn split_at_last_line<'a>(tail: &[&'a str]) -> Split<'a> {
    let last = tail.len() - 1;
    if has_reference_prefix(tail[last]) {
        Split {
            products: tail[..last - 1].to_vec(),
            order: tail[last - 1],
            reference: Some(tail[last]),
        }
    } else {
        Split {
            products: tail[..last].to_vec(),
            order: tail[last],
            reference: None,
        }
    }
}

fn split_by_keyword<'a>(tail: &[&'a str]) -> Result<Split<'a>, ExtractionError> {
    let mut products = Vec::new();
    let mut idx = 0;

    while idx < tail.len() && products.len() < MAX_PRODUCTS {
        let line = tail[idx];
        let next_is_reference = tail.get(idx + 1).is_some_and(|n| has_reference_prefix(n));
        if line.to_uppercase().contains(ORDER_KEYWORD) || next_is_reference {
            break;
        }
        products.push(line);
        idx += 1;
    }

    let order = tail.get(idx).copied().unwrap_or_default();
    let reference = tail.get(idx + 1).copied();
    if let Some(reference) = reference {
        if !has_reference_prefix(reference) {
            return Err(ExtractionError::InvalidReference(reference.trim().to_string()));
        }
    }

    Ok(Split {
        products,
        order,
        reference,
    })
}

/// Parse pasted text into a [`JobRecord`]
///
/// Lines are: customer name, address, phone, email, one or more products,
/// the SORD number and optionally a WK number. Blank lines are ignored.
///
/// # Example
/// ```
/// let record = worksheet::extract(
///     "Acme Ltd\n1 Main St\n0123456\na@b.com\nWidget A\nWidget B\nSORD100\nWK55",
/// )
/// .unwrap();
/// assert_eq!(record.order_number, "SORD100");
/// assert_eq!(record.reference_number.as_deref(), Some("WK55"));
/// ```
pub fn extract(raw: &str) -> Result<JobRecord, ExtractionError> {
    extract_with(raw, ProductBoundary::LastLine)
}

/// Parse pasted text using a specific product boundary rule
pub fn extract_with(raw: &str, boundary: ProductBoundary) -> Result<JobRecord, ExtractionError> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();

    if lines.len() < MIN_LINES {
        return Err(ExtractionError::TooFewLines { found: lines.len() });
    }

    let tail = &lines[FIRST_PRODUCT..];
    let split = match boundary {
        ProductBoundary::LastLine => split_at_last_line(tail),
        ProductBoundary::KeywordScan => split_by_keyword(tail)?,
    };

    let record = JobRecord {
        customer_name: lines[0].trim().to_string(),
        address: lines[1].trim().to_string(),
        phone: lines[2].trim().to_string(),
        email: lines[3].trim().to_string(),
        products: split
            .products
            .iter()
            .take(MAX_PRODUCTS)
            .map(|p| p.trim().to_string())
            .collect(),
        order_number: split.order.trim().to_string(),
        reference_number: split.reference.map(|r| r.trim().to_string()),
    };

    if record.customer_name.is_empty() {
        return Err(ExtractionError::MissingField("customer name"));
    }
    if record.order_number.is_empty() {
        return Err(ExtractionError::MissingField("SORD number"));
    }
    if record.products.is_empty() {
        return Err(ExtractionError::NoProducts);
    }

    Ok(record)
}

impl JobRecord {
    /// The WK number when one was given
    pub fn reference(&self) -> Option<&str> {
        self.reference_number.as_deref().filter(|r| !r.is_empty())
    }
}
