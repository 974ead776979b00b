use crate::model::Package;
use tabled::{settings::Style, Table};

use super::ProviderRow;

/// One-line rendering: `label (version)`, or `label (version → next)` when outdated.
pub fn format_line(pkg: &Package) -> String {
    match pkg.next_version() {
        Some(next) if pkg.is_outdated() => {
            format!("{} ({} → {})", pkg.label(), pkg.version(), next)
        }
        _ => format!("{} ({})", pkg.label(), pkg.version()),
    }
}

/// Multi-line description used by `info`.
pub fn format_detail(pkg: &Package) -> String {
    let mut out = format!(
        "Package: {}\nName: {}\nVersion: {}\n",
        pkg.reference(),
        pkg.label(),
        pkg.version()
    );
    if let Some(next) = pkg.next_version() {
        out.push_str(&format!("Available: {}\n", next));
    }
    out.push_str(&format!("State: {}\n", pkg.state()));
    if let Some(summary) = pkg.summary() {
        out.push_str(&format!("Summary: {}\n", summary));
    }
    if !pkg.binaries().is_empty() {
        out.push_str(&format!("Binaries: {}\n", pkg.binaries().join(", ")));
    }
    out
}

/// Renders outdated packages, or every package prefixed by its state symbol
/// when `all` is set.
pub fn render_packages(packages: &[&Package], all: bool) -> String {
    let mut out = String::new();
    for pkg in packages {
        if all {
            out.push_str(&format!("{} {}\n", pkg.state().symbol(), format_line(pkg)));
        } else if pkg.is_outdated() {
            out.push_str(&format_line(pkg));
            out.push('\n');
        }
    }
    out
}

pub fn print_packages(packages: &[&Package], all: bool) {
    print!("{}", render_packages(packages, all));
}

pub fn print_details(packages: &[Package]) {
    let details: Vec<_> = packages.iter().map(format_detail).collect();
    print!("{}", details.join("\n"));
}

pub fn render_providers(rows: &[ProviderRow]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn print_providers(rows: &[ProviderRow]) {
    if rows.is_empty() {
        println!("No providers available.");
        return;
    }
    println!("{}", render_providers(rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outdated() -> Package {
        Package::new("homebrew", "someone/tap/tool", "1.0")
            .with_label("tool")
            .with_next_version("1.1")
    }

    #[test]
    fn test_format_line() {
        assert_eq!(format_line(&outdated()), "tool (1.0 → 1.1)");

        let current = Package::new("pip", "requests", "2.31.0").up_to_date();
        assert_eq!(format_line(&current), "requests (2.31.0)");

        let unknown = Package::new("go", "orphan", "2024-01-01");
        assert_eq!(format_line(&unknown), "orphan (2024-01-01)");
    }

    #[test]
    fn test_format_detail() {
        let pkg = Package::new("cargo", "ripgrep", "14.0.0")
            .with_summary(Some("Recursive grep".into()))
            .with_binaries(vec!["rg".into()])
            .with_next_version("14.1.0");
        assert_eq!(
            format_detail(&pkg),
            "Package: cargo/ripgrep\n\
             Name: ripgrep\n\
             Version: 14.0.0\n\
             Available: 14.1.0\n\
             State: outdated\n\
             Summary: Recursive grep\n\
             Binaries: rg\n"
        );
    }

    #[test]
    fn test_format_detail_without_next_version() {
        let pkg = Package::new("go", "orphan", "2024-01-01");
        let detail = format_detail(&pkg);
        assert!(!detail.contains("Available"));
        assert!(detail.contains("State: unknown"));
    }

    #[test]
    fn test_render_packages() {
        let a = outdated();
        let b = Package::new("pip", "requests", "2.31.0").up_to_date();
        let c = Package::new("go", "orphan", "2024-01-01");
        let packages = vec![&a, &b, &c];

        assert_eq!(render_packages(&packages, false), "tool (1.0 → 1.1)\n");
        assert_eq!(
            render_packages(&packages, true),
            "+ tool (1.0 → 1.1)\n= requests (2.31.0)\n? orphan (2024-01-01)\n"
        );
    }

    #[test]
    fn test_render_providers() {
        let rows = vec![
            ProviderRow { name: "cargo".into(), available: true },
            ProviderRow { name: "pip2".into(), available: false },
        ];
        let table = render_providers(&rows);
        assert!(table.contains("Provider"));
        assert!(table.contains("cargo"));
        assert!(table.contains("false"));
    }
}
