//! Files written next to the generated document.
//!
//! - [`json`]: archives the week's script package for later rebuilds
//!
//! ```text
//! json_output_dir/
//! ├── 2025-10-06.json
//! └── 2025-10-13.json
//! ```

pub mod json;
