//! Output generation.
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── headlines.json                    # merged archive, overwritten
//! ├── links.json                        # this run's menu, overwritten
//! └── archive/
//!     ├── headlines_2025-05-06.json     # per-run snapshot
//!     └── links_2025-05-06.json
//! ```

pub mod json;
