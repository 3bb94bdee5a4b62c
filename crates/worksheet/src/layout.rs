//! Field-to-coordinate layout
//!
//! Coordinates are points with the origin at the top-left of the first
//! page. They describe where the paper form expects each value; nothing is
//! derived from the template at runtime, so `page` states the geometry the
//! coordinates were measured on and stamping refuses templates that differ.

use crate::LayoutError;
use pdf_core::PageSize;
use serde::{Deserialize, Serialize};

/// Embedded default layout for the installation worksheet
pub const DEFAULT_LAYOUT: &str = include_str!("../data/layout.json");

/// Major layout version understood by this crate
pub const LAYOUT_VERSION: &str = "1";

fn default_font_size() -> f32 {
    10.0
}

fn default_field_width() -> f64 {
    120.0
}

fn default_tolerance() -> f64 {
    2.0
}

/// Page geometry the layout was measured on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,

    /// Allowed difference per dimension in points
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl PageGeometry {
    pub fn size(&self) -> PageSize {
        PageSize {
            width: self.width,
            height: self.height,
        }
    }
}

/// Printed caption for a field, used when synthesizing a blank template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldLabel {
    pub text: String,
    pub x: f64,
}

/// Where one scalar value goes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSlot {
    pub x: f64,
    pub y: f64,

    /// Font size in points
    #[serde(default = "default_font_size")]
    pub size: f32,

    /// Length of the writing rule on a synthesized template
    #[serde(default = "default_field_width")]
    pub width: f64,

    #[serde(default)]
    pub label: Option<FieldLabel>,
}

/// Where the product lines go
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductSlots {
    pub x: f64,

    /// Baseline of the first product
    pub y: f64,

    /// Vertical distance between successive products
    pub spacing: f64,

    #[serde(default = "default_font_size")]
    pub size: f32,

    #[serde(default = "default_field_width")]
    pub width: f64,

    #[serde(default)]
    pub label: Option<FieldLabel>,
}

impl ProductSlots {
    /// Top-left y coordinate of the product at `index`
    pub fn y_for(&self, index: usize) -> f64 {
        self.y + index as f64 * self.spacing
    }
}

/// Text printed on every worksheet regardless of the record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FixedText {
    pub text: String,
    pub x: f64,
    pub y: f64,

    #[serde(default = "default_font_size")]
    pub size: f32,

    #[serde(default)]
    pub label: Option<FieldLabel>,
}

/// The complete field-to-coordinate mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    /// Layout version ("1.x")
    pub version: String,

    #[serde(default)]
    pub page: Option<PageGeometry>,

    pub customer_name: FieldSlot,
    pub address: FieldSlot,
    pub phone: FieldSlot,
    pub email: FieldSlot,
    pub order_number: FieldSlot,
    pub reference_number: FieldSlot,
    pub products: ProductSlots,

    /// Every place the install date is printed
    #[serde(default)]
    pub install_date: Vec<FieldSlot>,

    #[serde(default)]
    pub fixed_text: Vec<FixedText>,
}

impl Layout {
    /// Parse and validate a layout from JSON
    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        let layout: Layout = serde_json::from_str(json)?;
        layout.validate()?;
        Ok(layout)
    }

    /// The layout shipped with the crate
    pub fn embedded() -> Result<Self, LayoutError> {
        Self::from_json(DEFAULT_LAYOUT)
    }

    /// Serialize back to JSON
    pub fn to_json(&self) -> Result<String, LayoutError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Scalar field slots with their names, in stamping order
    pub fn scalar_fields(&self) -> [(&'static str, &FieldSlot); 6] {
        [
            ("referenceNumber", &self.reference_number),
            ("customerName", &self.customer_name),
            ("orderNumber", &self.order_number),
            ("address", &self.address),
            ("phone", &self.phone),
            ("email", &self.email),
        ]
    }

    /// Check the layout is usable
    pub fn validate(&self) -> Result<(), LayoutError> {
        let major = self.version.split('.').next().unwrap_or_default();
        if major != LAYOUT_VERSION {
            return Err(LayoutError::Invalid(format!(
                "unsupported layout version {:?} (expected {LAYOUT_VERSION}.x)",
                self.version
            )));
        }

        if let Some(page) = &self.page {
            if !(page.width > 0.0 && page.height > 0.0) {
                return Err(LayoutError::Invalid(format!(
                    "page size must be positive, got {}x{}",
                    page.width, page.height
                )));
            }
            if !(page.tolerance >= 0.0) {
                return Err(LayoutError::Invalid(
                    "page tolerance must not be negative".to_string(),
                ));
            }
        }

        let install_dates = self
            .install_date
            .iter()
            .map(|slot| ("installDate", slot.x, slot.y, slot.size));
        let fixed = self
            .fixed_text
            .iter()
            .map(|t| ("fixedText", t.x, t.y, t.size));
        let positions = self
            .scalar_fields()
            .into_iter()
            .map(|(name, slot)| (name, slot.x, slot.y, slot.size))
            .chain(std::iter::once((
                "products",
                self.products.x,
                self.products.y,
                self.products.size,
            )))
            .chain(install_dates)
            .chain(fixed);

        for (name, x, y, size) in positions {
            if !(x.is_finite() && y.is_finite() && x >= 0.0 && y >= 0.0) {
                return Err(LayoutError::Invalid(format!(
                    "{name} position ({x}, {y}) is outside the page"
                )));
            }
            if !(size > 0.0) {
                return Err(LayoutError::Invalid(format!(
                    "{name} font size must be positive, got {size}"
                )));
            }
        }

        if !(self.products.spacing >= 0.0) {
            return Err(LayoutError::Invalid(format!(
                "products spacing must not be negative, got {}",
                self.products.spacing
            )));
        }

        Ok(())
    }
}
