//! Manifest row shapes
//!
//! Both shapes are flat records bound to CSV columns by header name and
//! stored one-to-one in a staging table column. The `staged_record!` macro
//! keeps the header list, the column list and the bind order in a single
//! declaration so they can never drift apart.

use serde::{Deserialize, Serialize};
use sqlx::query_builder::Separated;
use sqlx::Sqlite;

/// SQLite column type for a record field
pub trait SqlColumnType {
    const SQL: &'static str;
}

impl SqlColumnType for Option<String> {
    const SQL: &'static str = "TEXT";
}

impl SqlColumnType for Option<i32> {
    const SQL: &'static str = "INTEGER";
}

/// A record that can be bulk-inserted into its staging table
pub trait StagedRecord {
    /// Staging table name
    const TABLE: &'static str;
    /// CSV header names, in field order
    const HEADERS: &'static [&'static str];
    /// Staging column names, in field order
    const COLUMNS: &'static [&'static str];
    /// Staging column types, in field order
    const SQL_TYPES: &'static [&'static str];

    /// Push one bind per column, in column order
    fn push_binds(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>);
}

macro_rules! staged_record {
    (
        $(#[$meta:meta])*
        pub struct $name:ident in $table:literal {
            $( $(#[doc = $doc:literal])* $header:literal => $field:ident : $ty:ty, )*
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $header)]
                pub $field: $ty,
            )*
        }

        impl StagedRecord for $name {
            const TABLE: &'static str = $table;
            const HEADERS: &'static [&'static str] = &[$($header),*];
            const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),*];
            const SQL_TYPES: &'static [&'static str] = &[$(<$ty as SqlColumnType>::SQL),*];

            fn push_binds(&self, row: &mut Separated<'_, '_, Sqlite, &'static str>) {
                $( row.push_bind(self.$field.clone()); )*
            }
        }
    };
}

staged_record! {
    /// One row of an iHerb shipping manifest
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct IherbManifestEntry in "iherb_manifest_entries" {
        "Company name" => company_name: Option<String>,
        "№ agreement" => agreement_number: Option<String>,
        "barcode" => barcode: Option<String>,
        "sender name" => sender_name: Option<String>,
        "receiver_name" => receiver_name: Option<String>,
        "zip_code" => zip_code: Option<String>,
        "region" => region: Option<String>,
        "district" => district: Option<String>,
        "city" => city: Option<String>,
        "street" => street: Option<String>,
        "house" => house: Option<String>,
        "building" => building: Option<String>,
        "apartment" => apartment: Option<String>,
        "mobile phone number" => mobile_phone_number: Option<String>,
        "tarif_euro" => tariff_euro: Option<String>,
        "tarif_euro_cent" => tariff_euro_cent: Option<String>,
        "weight_of_the_parcel_kg" => weight_of_the_parcel_kg: Option<i32>,
        "weight_of_the_parcel_g" => weight_of_the_parcel_g: Option<i32>,
        "type_of_service_code" => type_of_service_code: Option<String>,
        "COD_amount_kur" => cod_amount_kur: Option<String>,
        "COD_amount_rur_kopeks" => cod_amount_rur_kopeks: Option<String>,
        "no_of_the_product" => no_of_the_product: Option<String>,
        "name_of_the_product" => name_of_the_product: Option<String>,
        "quantity of identical items_of_product" => quantity_of_identical_items_of_product: Option<String>,
        "weight_of_the_product_kg" => weight_of_the_product_kg: Option<String>,
        "weight_of_the_product_g" => weight_of_the_product_g: Option<String>,
        "product_value_US" => product_value_us: Option<String>,
        "product_value_US_cent" => product_value_us_cent: Option<String>,
        "category" => category: Option<String>,
        "comments" => comments: Option<String>,
        "invoice_id" => invoice_id: Option<String>,
        "country" => country: Option<String>,
        "zip_sender" => zip_sender: Option<String>,
        "region_sender" => region_sender: Option<String>,
        "district1" => district1: Option<String>,
        "city_sender" => city_sender: Option<String>,
        "street_sender" => street_sender: Option<String>,
        "bldg_sender" => bldg_sender: Option<String>,
        "apartment_sender" => apartment_sender: Option<String>,
        /// Unnamed marker column, literally headed `*`
        "*" => asterisk_column: Option<String>,
        "№ of delivery lot" => number_of_delivery_lot: Option<String>,
        "type_delivery_code" => type_delivery_code: Option<String>,
        "LogisticsOrderCode" => logistics_order_code: Option<String>,
        "OrderMade" => order_made: Option<String>,
        "IMID" => imid: Option<String>,
        "PriceCurrency" => price_currency: Option<String>,
        "URL of the Internet store" => url_of_the_internet_store: Option<String>,
        "Name of the Internet store" => name_of_the_internet_store: Option<String>,
        "CategoryFeature" => category_feature: Option<String>,
        "URL from the product" => url_from_the_product: Option<String>,
        "HSCode" => hs_code: Option<String>,
        /// Source-side `ID` column, distinct from the staging primary key
        "ID" => id_column: Option<String>,
        "PickUp_Name" => pick_up_name: Option<String>,
        "PickUp_ZipCode" => pick_up_zip_code: Option<String>,
        "Dispatch barcode" => dispatch_barcode: Option<String>,
        "Date of dispatch" => date_of_dispatch: Option<String>,
        "Airport of Departure" => airport_of_departure: Option<String>,
        "Airport of Arrival" => airport_of_arrival: Option<String>,
        "No Returns" => no_returns: Option<String>,
    }
}

staged_record! {
    /// One row of the canonical manifest
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
    #[serde(default)]
    pub struct UniversalManifestEntry in "universal_manifest_entries" {
        "SellerID" => seller_id: Option<String>,
        "ItemTrackingNumber" => item_tracking_number: Option<String>,
        "Weight" => weight: Option<String>,
        "Price" => price: Option<String>,
        "PriceCurrency" => price_currency: Option<String>,
        "Product" => product: Option<String>,
        "ReceptacleID" => receptacle_id: Option<String>,
        "SenderName" => sender_name: Option<String>,
        "SenderCountry" => sender_country: Option<String>,
        "SenderZip" => sender_zip: Option<String>,
        "SenderLocality" => sender_locality: Option<String>,
        "SenderAddress" => sender_address: Option<String>,
        "ReceiverName" => receiver_name: Option<String>,
        "ReceiverCountry" => receiver_country: Option<String>,
        "ReceiverZip" => receiver_zip: Option<String>,
        "ReceiverAddress" => receiver_address: Option<String>,
        "ReceiverPhone" => receiver_phone: Option<String>,
        "ReceiverEmail" => receiver_email: Option<String>,
        "OrderNo" => order_no: Option<String>,
        "OrderDateTime" => order_date_time: Option<String>,
        "LogisticsOrderCode" => logistics_order_code: Option<String>,
    }
}
