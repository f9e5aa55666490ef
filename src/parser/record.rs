use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::str::FromStr;

use super::cidr::IpRange;
use crate::schema::{TableSchema, BLOCKS, LOCATIONS};

#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            SqlValue::Integer(i) => i.to_sql(),
            SqlValue::Real(f) => f.to_sql(),
            SqlValue::Text(s) => s.as_str().to_sql(),
        }
    }
}

/// A CSV row type that maps onto one destination table.
pub trait SourceRecord: Sized {
    /// Row as deserialized from the CSV, before validation
    type Raw: DeserializeOwned;

    fn schema() -> &'static TableSchema;

    /// Validate and derive; `None` drops the row.
    fn from_raw(raw: Self::Raw) -> Option<Self>;

    /// Append values in `schema()` column order
    fn push_values(self, out: &mut Vec<SqlValue>);
}

/// One row of `GeoLite2-City-Locations-<locale>.csv`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawLocation {
    pub geoname_id: String,
    pub locale_code: String,
    pub continent_code: String,
    pub continent_name: String,
    pub country_iso_code: String,
    pub country_name: String,
    pub subdivision_1_iso_code: String,
    pub subdivision_1_name: String,
    pub subdivision_2_iso_code: String,
    pub subdivision_2_name: String,
    pub city_name: String,
    pub metro_code: String,
    pub time_zone: String,
}

/// One row of `GeoLite2-City-Blocks-IPv4.csv`
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawBlock {
    pub network: String,
    pub geoname_id: String,
    pub registered_country_geoname_id: String,
    pub represented_country_geoname_id: String,
    pub is_anonymous_proxy: String,
    pub is_satellite_provider: String,
    pub postal_code: String,
    pub latitude: String,
    pub longitude: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationRecord {
    pub geoname_id: u32,
    pub locale_code: String,
    pub continent_code: String,
    pub continent_name: String,
    pub country_iso_code: String,
    pub country_name: String,
    pub subdivision_1_iso_code: String,
    pub subdivision_1_name: String,
    pub subdivision_2_iso_code: String,
    pub subdivision_2_name: String,
    pub city_name: String,
    pub metro_code: i64,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub network: String,
    pub range: IpRange,
    pub geoname_id: u32,
    pub registered_country_geoname_id: u32,
    pub represented_country_geoname_id: u32,
    pub is_anonymous_proxy: bool,
    pub is_satellite_provider: bool,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl SourceRecord for LocationRecord {
    type Raw = RawLocation;

    fn schema() -> &'static TableSchema {
        &LOCATIONS
    }

    fn from_raw(raw: RawLocation) -> Option<Self> {
        let geoname_id = raw.geoname_id.trim().parse::<u32>().ok()?;

        Some(LocationRecord {
            geoname_id,
            locale_code: clean(raw.locale_code),
            continent_code: clean(raw.continent_code),
            continent_name: clean(raw.continent_name),
            country_iso_code: clean(raw.country_iso_code),
            country_name: clean(raw.country_name),
            subdivision_1_iso_code: clean(raw.subdivision_1_iso_code),
            subdivision_1_name: clean(raw.subdivision_1_name),
            subdivision_2_iso_code: clean(raw.subdivision_2_iso_code),
            subdivision_2_name: clean(raw.subdivision_2_name),
            city_name: clean(raw.city_name),
            metro_code: number_or_zero(&raw.metro_code),
            time_zone: clean(raw.time_zone),
        })
    }

    fn push_values(self, out: &mut Vec<SqlValue>) {
        out.extend([
            SqlValue::Integer(i64::from(self.geoname_id)),
            SqlValue::Text(self.locale_code),
            SqlValue::Text(self.continent_code),
            SqlValue::Text(self.continent_name),
            SqlValue::Text(self.country_iso_code),
            SqlValue::Text(self.country_name),
            SqlValue::Text(self.subdivision_1_iso_code),
            SqlValue::Text(self.subdivision_1_name),
            SqlValue::Text(self.subdivision_2_iso_code),
            SqlValue::Text(self.subdivision_2_name),
            SqlValue::Text(self.city_name),
            SqlValue::Integer(self.metro_code),
            SqlValue::Text(self.time_zone),
        ]);
    }
}

impl SourceRecord for BlockRecord {
    type Raw = RawBlock;

    fn schema() -> &'static TableSchema {
        &BLOCKS
    }

    fn from_raw(raw: RawBlock) -> Option<Self> {
        let network = clean(raw.network);
        let range = network.parse::<IpRange>().ok()?;

        Some(BlockRecord {
            network,
            range,
            geoname_id: number_or_zero(&raw.geoname_id),
            registered_country_geoname_id: number_or_zero(&raw.registered_country_geoname_id),
            represented_country_geoname_id: number_or_zero(&raw.represented_country_geoname_id),
            is_anonymous_proxy: flag(&raw.is_anonymous_proxy),
            is_satellite_provider: flag(&raw.is_satellite_provider),
            postal_code: clean(raw.postal_code),
            latitude: coordinate(&raw.latitude),
            longitude: coordinate(&raw.longitude),
        })
    }

    fn push_values(self, out: &mut Vec<SqlValue>) {
        // range bounds never exceed 2^33, so they fit i64
        out.extend([
            SqlValue::Text(self.network),
            SqlValue::Integer(self.range.start as i64),
            SqlValue::Integer(self.range.end as i64),
            SqlValue::Integer(i64::from(self.geoname_id)),
            SqlValue::Integer(i64::from(self.registered_country_geoname_id)),
            SqlValue::Integer(i64::from(self.represented_country_geoname_id)),
            SqlValue::Integer(i64::from(self.is_anonymous_proxy)),
            SqlValue::Integer(i64::from(self.is_satellite_provider)),
            SqlValue::Text(self.postal_code),
            SqlValue::Real(self.latitude),
            SqlValue::Real(self.longitude),
        ]);
    }
}

fn clean(s: String) -> String {
    let trimmed = s.trim();
    if trimmed.len() == s.len() {
        s
    } else {
        trimmed.to_string()
    }
}

/// Empty or unparsable numbers become zero, like MySQL's non-strict coercion
fn number_or_zero<T: FromStr + Default>(s: &str) -> T {
    s.trim().parse().unwrap_or_default()
}

fn flag(s: &str) -> bool {
    s.trim() == "1"
}

/// Round to the four fraction digits of DECIMAL(7,4)
fn coordinate(s: &str) -> f64 {
    let value: f64 = number_or_zero(s);
    if value.is_finite() {
        (value * 10_000.0).round() / 10_000.0
    } else {
        0.0
    }
}
