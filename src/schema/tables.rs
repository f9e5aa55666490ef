//! Destination tables for the GeoLite2 City dataset

use super::types::*;

pub static LOCATIONS: TableSchema = TableSchema {
    name: "geoip_location",
    columns: &[
        Column::required("geoname_id", ColumnType::Unsigned),
        Column::required("locale_code", ColumnType::Char(2)),
        Column::required("continent_code", ColumnType::Char(2)),
        Column::required("continent_name", ColumnType::VarChar(24)),
        Column::required("country_iso_code", ColumnType::Char(2)),
        Column::required("country_name", ColumnType::VarChar(36)),
        Column::required("subdivision_1_iso_code", ColumnType::Char(3)),
        Column::required("subdivision_1_name", ColumnType::VarChar(36)),
        Column::required("subdivision_2_iso_code", ColumnType::Char(3)),
        Column::required("subdivision_2_name", ColumnType::VarChar(36)),
        Column::required("city_name", ColumnType::VarChar(50)),
        Column::required("metro_code", ColumnType::Integer),
        Column::required("time_zone", ColumnType::VarChar(24)),
    ],
    primary_key: "geoname_id",
    batch_size: 500,
};

pub static BLOCKS: TableSchema = TableSchema {
    name: "geoip_block",
    columns: &[
        Column::required("network", ColumnType::VarChar(20)),
        Column::required("range_start", ColumnType::BigUnsigned),
        Column::required("range_end", ColumnType::BigUnsigned),
        Column::required("geoname_id", ColumnType::Unsigned),
        Column::required("registered_country_geoname_id", ColumnType::Unsigned),
        Column::required("represented_country_geoname_id", ColumnType::Unsigned),
        Column::required("is_anonymous_proxy", ColumnType::Boolean),
        Column::required("is_satellite_provider", ColumnType::Boolean),
        Column::required("postal_code", ColumnType::VarChar(15)),
        Column::required("latitude", ColumnType::Decimal(7, 4)),
        Column::required("longitude", ColumnType::Decimal(7, 4)),
    ],
    primary_key: "network",
    batch_size: 2000,
};

/// All tables, in load order
pub static ALL_TABLES: &[&TableSchema] = &[&LOCATIONS, &BLOCKS];

/// Get a table by name
pub fn get_table(name: &str) -> Option<&'static TableSchema> {
    ALL_TABLES.iter().find(|t| t.name == name).copied()
}

/// Get all table names
pub fn table_names() -> Vec<&'static str> {
    ALL_TABLES.iter().map(|t| t.name).collect()
}
