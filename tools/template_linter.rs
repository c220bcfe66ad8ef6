/// Template Linter: checks a template set against the seed policy.
///
/// Usage: template_linter <template_file_or_dir> [--overlay]
///
/// With `--overlay` the set is merged over the built-in templates first,
/// the way `RecursionEngine::builder().templates_dir(..)` would load it.

use recursive_prompting::core::policy::{RecursionPolicy, CONTEXT_KEYS};
use recursive_prompting::core::template::TemplateStore;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: template_linter <template_file_or_dir> [--overlay]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let overlay = args[2..].iter().any(|a| a == "--overlay");

    let loaded = if target.is_file() {
        TemplateStore::load_from_ron(target)
    } else if target.is_dir() {
        TemplateStore::load_from_dir(target)
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    };

    let loaded = match loaded {
        Ok(store) => store,
        Err(e) => {
            eprintln!("ERROR: Failed to load templates: {}", e);
            process::exit(1);
        }
    };
    println!("Loaded {} templates", loaded.len());

    let store = if overlay {
        match TemplateStore::seed() {
            Ok(mut base) => {
                base.merge(loaded);
                base
            }
            Err(e) => {
                eprintln!("ERROR: Failed to load built-in templates: {}", e);
                process::exit(1);
            }
        }
    } else {
        loaded
    };

    let policy = RecursionPolicy::default();
    let report = store.lint(&policy.required_templates(), &CONTEXT_KEYS);

    println!("\n=== Template Lint Report ===\n");

    if report.is_clean() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    if report.errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}
