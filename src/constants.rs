//! Format-wide constants shared by the container, the codecs and the facade.

/// File extension of DSFF containers
pub const DSFF_EXTENSION: &str = "dsff";

/// Delimiter used by the delimited-text codec and dataset folders
pub const CSV_DELIMITER: u8 = b';';

/// Columns dropped from attribute-relation export and from derived feature lists
pub const DEFAULT_EXCLUDED: [&str; 6] = ["hash", "realpath", "format", "size", "ctime", "mtime"];

/// Path sentinel for a container that lives only in memory
pub const IN_MEMORY: &str = "<memory>";

/// Document-level keys that never surface in the user metadata view
pub const RESERVED_METADATA_KEYS: [&str; 3] = ["created", "modified", "revision"];

/// Textual placeholder of an absent value in text formats
pub const MISSING_TOKEN: &str = "?";

/// Default name of the target/label column
pub const TARGET_NAME: &str = "label";

/// Schema metadata key holding the metadata mapping in columnar files
pub const METADATA_SCHEMA_KEY: &str = "__metadata__";

/// Field metadata key holding a feature description in columnar files
pub const DESCRIPTION_FIELD_KEY: &str = "description";

/// Names of the two worksheets, in their mandatory order
pub const SHEET_NAMES: [&str; 2] = ["data", "features"];

/// Header row of the features worksheet
pub const FEATURES_HEADER: [&str; 2] = ["name", "description"];

/// Creator recorded when no user can be determined
pub const DEFAULT_CREATOR: &str = "dsff";

/// Name used when neither a title nor a path is available
pub const UNDEFINED_NAME: &str = "undefined";
