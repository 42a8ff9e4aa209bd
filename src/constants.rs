/// Column and table name constants to ensure consistency across the codebase

// Output table
pub const DEFAULT_TABLE_NAME: &str = "ETL_pipeline_cleaned";

// Input columns
pub const ID_COLUMN: &str = "id";
pub const CATEGORIES_COLUMN: &str = "categories";
pub const CATEGORY_DELIMITER: char = ';';

// Category columns with special handling after decoding
pub const RELATED_CATEGORY: &str = "related";
pub const CHILD_ALONE_CATEGORY: &str = "child_alone";

// Suffixes for non-key columns present in both inputs
pub const LEFT_SUFFIX: &str = "_x";
pub const RIGHT_SUFFIX: &str = "_y";

// Config file discovery
pub const CONFIG_ENV_VAR: &str = "ETL_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "etl.toml";

/// Get the default set of columns whose out-of-range values are binarized
pub fn default_binarize_columns() -> Vec<String> {
    vec![RELATED_CATEGORY.to_string()]
}

/// Get the default set of constant category columns that are dropped
pub fn default_drop_columns() -> Vec<String> {
    vec![CHILD_ALONE_CATEGORY.to_string()]
}
