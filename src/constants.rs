//! Global Constants
//!
//! Centralized constants for detection heuristics, process handling and tuning.
//! All magic numbers should be defined here with documentation.

/// Package family detection constants
pub mod families {
    /// Default minimum number of packages for an auto-detected family
    pub const DEFAULT_MIN_FAMILY_SIZE: usize = 2;

    /// Default minimum confidence for a candidate family to be kept
    pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.3;

    /// Deepest dot-separated prefix considered by the pattern detector
    pub const MAX_PREFIX_DEPTH: usize = 3;

    /// Prefixes this short (in characters) are never a family
    pub const MIN_PREFIX_CHARS: usize = 3;

    /// A prefix covering at least this share of all packages is too generic
    pub const GENERIC_PREFIX_RATIO: f32 = 0.8;

    /// Pattern length at which the length score saturates
    pub const PATTERN_LENGTH_SATURATION: f32 = 20.0;

    /// Group size at which the size score saturates
    pub const GROUP_SIZE_SATURATION: f32 = 10.0;

    /// Fixed confidence of user-supplied regex patterns
    pub const CUSTOM_PATTERN_CONFIDENCE: f32 = 0.9;

    /// Dependent count at which the dependency ratio saturates
    pub const DEPENDENT_SATURATION: f32 = 5.0;

    /// Bonus for well-known ecosystem roots
    pub const WELL_KNOWN_ROOT_BONUS: f32 = 0.2;

    /// Fixed confidence of metadata (author/tag) families
    pub const METADATA_CONFIDENCE: f32 = 0.8;

    /// Packages per AI grouping request
    pub const AI_BATCH_SIZE: usize = 100;

    /// Confidence assumed when the oracle omits one
    pub const AI_DEFAULT_CONFIDENCE: f32 = 0.7;

    /// Multiplier applied to an AI family that lost packages to a stronger one
    pub const AI_OVERLAP_PENALTY: f32 = 0.8;

    /// Jaccard overlap above which two candidates merge
    pub const MERGE_OVERLAP_THRESHOLD: f32 = 0.7;

    /// Suffixes that mark sibling packages of one product
    pub const SUFFIX_VOCABULARY: &[&str] = &[
        "Client",
        "Core",
        "Extensions",
        "Common",
        "Abstractions",
        "Contracts",
    ];

    /// Default well-known ecosystem roots (configurable)
    pub const DEFAULT_WELL_KNOWN_ROOTS: &[&str] = &[
        "Microsoft.Extensions.DependencyInjection.Abstractions",
        "Microsoft.Extensions.Logging.Abstractions",
        "Microsoft.Extensions.Options",
        "Newtonsoft.Json",
        "System.Text.Json",
    ];
}

/// Dependency graph constants
pub mod graph {
    /// Maximum number of critical paths reported
    pub const MAX_CRITICAL_PATHS: usize = 10;

    /// Minimum packages in a reported critical path
    pub const MIN_CRITICAL_PATH_LEN: usize = 2;
}

/// `dotnet` process constants
pub mod process {
    /// Default executable name
    pub const DEFAULT_DOTNET: &str = "dotnet";

    /// Timeout for listing commands (seconds)
    pub const LIST_TIMEOUT_SECS: u64 = 60;

    /// Timeout for a single `add package` (seconds)
    pub const UPGRADE_TIMEOUT_SECS: u64 = 120;

    /// Timeout for `restore` (seconds)
    pub const RESTORE_TIMEOUT_SECS: u64 = 120;

    /// Timeout for scaffolding a probe project (seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 90;

    /// Restore diagnostic codes scanned for
    pub const RESTORE_CODES: &[&str] = &["NU1107", "NU1102", "NU1605", "NU1608", "NU1101"];
}

/// Oracle constants
pub mod oracle {
    /// Timeout for a single oracle request (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Characters of a malformed response kept for logging
    pub const PREVIEW_CHARS: usize = 200;
}

/// Provider chain constants
pub mod chain {
    /// Maximum total attempts across all providers
    pub const MAX_TOTAL_ATTEMPTS: usize = 6;

    /// Default maximum retries per provider
    pub const DEFAULT_MAX_RETRIES: u8 = 2;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 10;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// NuGet registry constants
pub mod registry {
    /// Registration base (uncompressed responses)
    pub const DEFAULT_REGISTRATION_BASE: &str =
        "https://api.nuget.org/v3/registration5-semver1";

    /// Request timeout (seconds)
    pub const TIMEOUT_SECS: u64 = 20;
}

/// Strategy estimation constants
pub mod strategy {
    /// Family-first minutes per phase (low, high)
    pub const FAMILY_MINUTES_PER_PHASE: (usize, usize) = (3, 5);

    /// Conservative minutes per phase (low, high)
    pub const CONSERVATIVE_MINUTES_PER_PHASE: (usize, usize) = (2, 3);

    /// Fixed all-at-once estimate
    pub const ALL_AT_ONCE_ESTIMATE: &str = "5-10 minutes";

    /// Strategy name used when nothing needs upgrading
    pub const NO_UPDATES_NAME: &str = "No Updates Needed";

    /// Package prefixes ordered first by the deterministic fallback
    pub const FRAMEWORK_PREFIXES: &[&str] = &["Microsoft.", "System."];
}
