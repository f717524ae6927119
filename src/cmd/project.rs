//! Project initialization (`autosteer init`).

use anyhow::Result;

pub fn cmd_init(project_dir: &std::path::Path) -> Result<()> {
    use autosteer::init::init_project;

    let result = init_project(project_dir)?;

    if result.created {
        println!(
            "Initialized autosteer project at {}",
            result.steer_dir.display()
        );
        println!();
        println!("Created directory structure:");
        println!("  .autosteer/");
        println!("  ├── autosteer.toml  # Configuration (see `autosteer config show`)");
        println!("  └── profiles/       # Profile definitions to import");
        println!();
        println!("Next steps:");
        println!("  1. Write a profile and run `autosteer profile import <file>`");
        println!("  2. Run `autosteer start <task> --profile <id>`");
        println!("  3. Call `autosteer evaluate <task>` after each iteration");
    } else {
        println!(
            "Autosteer project already initialized at {}",
            result.steer_dir.display()
        );
        if result.wrote_config {
            println!("Wrote missing autosteer.toml.");
        } else {
            println!("Directory structure verified.");
        }
    }

    Ok(())
}
