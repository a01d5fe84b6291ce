//! Application constants for the dataset workbench
//!
//! Default values, limits and fixed names used across the loaders,
//! writers, the GPS registry and the HTTP surface.

// =============================================================================
// Dataset Upload and Preview
// =============================================================================

/// Directory uploaded datasets are stored in when nothing else is configured
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";

/// Rows shown in a dataset preview unless the caller asks for another amount
pub const DEFAULT_PREVIEW_ROWS: usize = 10;

/// Upper bound for any requested preview size
pub const MAX_PREVIEW_ROWS: usize = 1_000;

/// Default request body limit for uploads (64 MB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Default listen address for the HTTP server
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5000";

/// Base name used for converted dataset downloads
pub const CONVERTED_FILE_STEM: &str = "converted_dataset";

// =============================================================================
// Tabular Parsing
// =============================================================================

/// Cell texts that load as null, matching the usual dataframe conventions
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#NA", "<NA>", "N/A", "NA", "NULL", "NaN", "-NaN", "None", "n/a", "nan", "null",
];

/// Cell texts that load as boolean `true`
pub const TRUE_TOKENS: &[&str] = &["true", "True", "TRUE"];

/// Cell texts that load as boolean `false`
pub const FALSE_TOKENS: &[&str] = &["false", "False", "FALSE"];

/// Prefix for columns whose header cell is blank
pub const UNNAMED_COLUMN_PREFIX: &str = "Unnamed: ";

/// Rows available in one Excel worksheet, header row included
pub const XLSX_MAX_ROWS: usize = 1_048_576;

/// Columns available in one Excel worksheet
pub const XLSX_MAX_COLUMNS: usize = 16_384;

/// Worksheet name used for converted spreadsheets
pub const XLSX_SHEET_NAME: &str = "Sheet1";

/// Datetime rendering for spreadsheet date cells
pub const SPREADSHEET_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest magnitude below which every whole `f64` is an exact integer (2^53)
pub const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Rendering of Stata `%td` dates
pub const STATA_DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Stata DTA Encoding
// =============================================================================

/// Stata storage type codes for releases 117 and later
pub mod stata_types {
    /// Largest fixed-width string type (`str2045`)
    pub const MAX_FIXED_STR: u16 = 2045;
    /// Long string stored in the strL table
    pub const STRL: u16 = 32768;
    pub const DOUBLE: u16 = 65526;
    pub const FLOAT: u16 = 65527;
    pub const LONG: u16 = 65528;
    pub const INT: u16 = 65529;
    pub const BYTE: u16 = 65530;
}

/// Largest non-missing values for Stata's integer types; anything above is
/// one of the missing codes `.`, `.a` ... `.z`
pub mod stata_missing {
    pub const BYTE_MAX: i8 = 100;
    pub const INT_MAX: i16 = 32_740;
    pub const LONG_MAX: i32 = 2_147_483_620;
    /// Bit pattern of 2^127, the float encoding of `.`
    pub const FLOAT_MISSING_BITS: u32 = 0x7f00_0000;
    /// Bit pattern of 2^1023, the double encoding of `.`
    pub const DOUBLE_MISSING_BITS: u64 = 0x7fe0_0000_0000_0000;
}

// =============================================================================
// GPS Registry
// =============================================================================

/// Fractional digits kept for stored coordinates
pub const COORDINATE_DECIMALS: usize = 11;

/// Column order of the GPS CSV export
pub const GPS_CSV_COLUMNS: [&str; 3] = ["ID", "Latitude", "Longitude"];

/// Download name of the GPS CSV export
pub const GPS_CSV_FILE_NAME: &str = "gps_data.csv";

/// Default map camera: a global view centred on the origin
pub const DEFAULT_MAP_CENTER: (f64, f64) = (0.0, 0.0);
pub const DEFAULT_MAP_ZOOM: u8 = 2;
pub const MAX_MAP_ZOOM: u8 = 19;

pub const DEFAULT_TILE_URL: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const DEFAULT_TILE_ATTRIBUTION: &str =
    "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors";

pub const LEAFLET_VERSION: &str = "1.9.4";
