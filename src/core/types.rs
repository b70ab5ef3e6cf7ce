// src/core/types.rs - Core Type Definitions
//! Core type definitions used throughout the e-store system
//!
//! This module defines the fundamental types used across all modules to ensure
//! type safety and consistency: id aliases, demographic types (gender, age
//! bands), and the reference-data records both engines read (cities, routes,
//! warehouses, categories, brands, products, customers, login log).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;
use uuid::Uuid;

use crate::EstoreError;

/// Type alias for order IDs - using UUID for global uniqueness
pub type OrderId = Uuid;

/// Type alias for user IDs (customers and admins)
pub type UserId = Uuid;

/// Type alias for product IDs
pub type ProductId = Uuid;

/// Type alias for city IDs
pub type CityId = i32;

/// Type alias for warehouse IDs
pub type WarehouseId = i64;

/// Type alias for product-category IDs
pub type CategoryId = i32;

/// Type alias for brand IDs
pub type BrandId = i32;

/// Type alias for city-route IDs
pub type RouteId = i32;

/// Type alias for monetary amounts
/// Note: In production systems, consider using a decimal type for exact precision
pub type Price = f64;

/// Type alias for timestamps
pub type Timestamp = DateTime<Utc>;

/// Customer gender as recorded on the profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male
    #[serde(rename = "M")]
    Male,
    /// Female
    #[serde(rename = "F")]
    Female,
    /// Not stated
    #[serde(rename = "N")]
    NotStated,
}

impl Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "M"),
            Self::Female => write!(f, "F"),
            Self::NotStated => write!(f, "N"),
        }
    }
}

impl FromStr for Gender {
    type Err = EstoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "M" | "MALE" => Ok(Self::Male),
            "F" | "FEMALE" => Ok(Self::Female),
            "N" | "NOT_STATED" => Ok(Self::NotStated),
            _ => Err(EstoreError::Validation(format!("Invalid gender: {s}"))),
        }
    }
}

/// Width of an age band in whole years
pub const AGE_BAND_WIDTH: u32 = 5;

/// Lower bound of the open-ended top age band
pub const AGE_BAND_OPEN_FROM: u32 = 65;

/// A fixed-width demographic age band
///
/// Ages partition into 5-year bins starting at 0 (`0-4`, `5-9`, …, `60-64`)
/// with an open-ended top band `65+`. Every non-negative age maps to exactly
/// one band; the bands cover the non-negative integers with no gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgeBand {
    lower: u32,
}

impl AgeBand {
    /// Band containing the given age in whole years
    pub fn from_age(age: u32) -> Self {
        if age >= AGE_BAND_OPEN_FROM {
            Self {
                lower: AGE_BAND_OPEN_FROM,
            }
        } else {
            Self {
                lower: (age / AGE_BAND_WIDTH) * AGE_BAND_WIDTH,
            }
        }
    }

    /// Parse a band from its display label (e.g. `"18-24"` will not parse;
    /// only canonical labels such as `"15-19"` or `"65+"` do)
    pub fn from_label(label: &str) -> Option<Self> {
        if label == format!("{AGE_BAND_OPEN_FROM}+") {
            return Some(Self {
                lower: AGE_BAND_OPEN_FROM,
            });
        }
        let (lo, hi) = label.split_once('-')?;
        let lo: u32 = lo.parse().ok()?;
        let hi: u32 = hi.parse().ok()?;
        if lo % AGE_BAND_WIDTH == 0 && hi == lo + AGE_BAND_WIDTH - 1 && lo < AGE_BAND_OPEN_FROM {
            Some(Self { lower: lo })
        } else {
            None
        }
    }

    /// Lower bound of the band (inclusive)
    pub fn lower(self) -> u32 {
        self.lower
    }

    /// Whether this is the open-ended top band
    pub fn is_open(self) -> bool {
        self.lower >= AGE_BAND_OPEN_FROM
    }

    /// Every band in ascending order of lower bound
    pub fn all() -> Vec<Self> {
        let mut bands: Vec<Self> = (0..AGE_BAND_OPEN_FROM)
            .step_by(AGE_BAND_WIDTH as usize)
            .map(|lower| Self { lower })
            .collect();
        bands.push(Self {
            lower: AGE_BAND_OPEN_FROM,
        });
        bands
    }

    /// Display label (`"0-4"`, `"60-64"`, `"65+"`)
    pub fn label(self) -> String {
        if self.is_open() {
            format!("{}+", self.lower)
        } else {
            format!("{}-{}", self.lower, self.lower + AGE_BAND_WIDTH - 1)
        }
    }
}

impl Display for AgeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A city in the delivery network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// City ID
    pub city_id: CityId,
    /// City name
    pub name: String,
}

/// A bidirectional route between two cities with a known distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRoute {
    /// Route ID
    pub route_id: RouteId,
    /// One endpoint
    pub city_a: CityId,
    /// The other endpoint
    pub city_b: CityId,
    /// Route length in kilometers
    pub distance_km: f64,
}

impl CityRoute {
    /// Whether the route touches the given city
    pub fn touches(&self, city: CityId) -> bool {
        self.city_a == city || self.city_b == city
    }

    /// The endpoint opposite to the given city, if the route touches it
    pub fn other_end(&self, city: CityId) -> Option<CityId> {
        if self.city_a == city {
            Some(self.city_b)
        } else if self.city_b == city {
            Some(self.city_a)
        } else {
            None
        }
    }
}

/// A fulfilment warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    /// Warehouse ID
    pub warehouse_id: WarehouseId,
    /// Warehouse name
    pub name: String,
    /// City the warehouse is located in
    pub city_id: CityId,
    /// Street address
    pub address: String,
}

/// A product category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    /// Category ID
    pub category_id: CategoryId,
    /// Category name
    pub name: String,
}

/// A product brand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    /// Brand ID
    pub brand_id: BrandId,
    /// Brand name
    pub name: String,
}

/// A catalog product as the analytics engine sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product ID
    pub product_id: ProductId,
    /// Product name
    pub name: String,
    /// Category the product belongs to
    pub category_id: CategoryId,
    /// Brand the product belongs to
    pub brand_id: BrandId,
    /// Current catalog price
    pub price: Price,
}

/// A customer profile as the analytics engine sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// User ID
    pub user_id: UserId,
    /// Email address
    pub email: String,
    /// Gender, if stated
    pub gender: Option<Gender>,
    /// Date of birth, if stated
    pub date_of_birth: Option<NaiveDate>,
    /// Home city, if stated
    pub city_id: Option<CityId>,
}

impl Customer {
    /// Age in whole years as of the given instant, if a date of birth is on file
    pub fn age_at(&self, as_of: Timestamp) -> Option<u32> {
        self.date_of_birth
            .and_then(|dob| as_of.date_naive().years_since(dob))
    }

    /// Age band as of the given instant, if a date of birth is on file
    pub fn age_band_at(&self, as_of: Timestamp) -> Option<AgeBand> {
        self.age_at(as_of).map(AgeBand::from_age)
    }
}

/// A login audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRecord {
    /// User who logged in
    pub user_id: UserId,
    /// When the login happened
    pub logged_at: Timestamp,
}
