//! CLI command implementations.
//!
//! | Module    | Commands handled                |
//! |-----------|---------------------------------|
//! | `project` | `Init`                          |
//! | `run`     | `Run`                           |
//! | `status`  | `Status`                        |
//! | `phase`   | `Detect`, `Analyze`, `Quality`  |

pub mod phase;
pub mod project;
pub mod run;
pub mod status;

pub use phase::{cmd_analyze, cmd_detect, cmd_quality};
pub use project::cmd_init;
pub use run::{RunArgs, cmd_run};
pub use status::cmd_status;

use anyhow::Result;
use std::path::Path;

pub(crate) fn check_initialized(project_dir: &Path) -> Result<()> {
    if !remedy::init::is_initialized(project_dir) {
        anyhow::bail!("Project not initialized. Run 'remedy init' first.");
    }
    Ok(())
}
