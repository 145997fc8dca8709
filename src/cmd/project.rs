//! `remedy init`.

use anyhow::Result;
use console::style;
use std::path::Path;
use std::process::ExitCode;

pub fn cmd_init(project_dir: &Path) -> Result<ExitCode> {
    use remedy::init::{CheckStatus, check_preconditions, init_project};
    use remedy::remedy_config::RemedyToml;
    use remedy::ui::icons::{CHECK, CROSS, FILE_NEW, FOLDER, WARN};

    let result = init_project(project_dir)?;
    if result.created {
        println!(
            "{}Initialized remedy project at {}",
            FOLDER,
            result.remedy_dir.display()
        );
    } else {
        println!(
            "{}remedy already initialized at {}",
            FOLDER,
            result.remedy_dir.display()
        );
    }
    if result.config_written {
        println!(
            "{}Wrote {}",
            FILE_NEW,
            result.remedy_dir.join("remedy.toml").display()
        );
    }

    let settings = RemedyToml::load_or_default(&result.remedy_dir)?;
    for warning in settings.validate() {
        println!("{}{}", WARN, style(warning).yellow());
    }

    let report = check_preconditions(project_dir, &settings);
    println!();
    println!("Environment checks:");
    for check in &report.checks {
        let icon = match check.status {
            CheckStatus::Ok => CHECK,
            CheckStatus::Warning => WARN,
            CheckStatus::Failed => CROSS,
        };
        println!("  {}{}", icon, check);
    }
    println!();

    if report.passed() {
        println!("Next: add [[detectors]] to remedy.toml, then run `remedy run`.");
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{}",
            style("Required preconditions failed; fix them before `remedy run`.").red()
        );
        Ok(ExitCode::FAILURE)
    }
}
