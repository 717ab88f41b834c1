use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=OUT_DIR");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let completions_dir = out_dir.join("completions");

    fs::create_dir_all(&completions_dir).unwrap();

    let mut cmd = clap::Command::new("longreader")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Longreader Contributors")
        .about("Turn web articles into clean markdown")
        .arg(clap::arg!(<INPUT> "URL to fetch, local HTML file, or '-' for stdin"))
        .arg(clap::arg!(--url <URL> "Source URL of a local or stdin document").value_name("URL"))
        .arg(
            clap::arg!(-f --format <FORMAT> "Output format (markdown, json)")
                .value_name("FORMAT")
                .default_value("markdown")
                .value_parser(["markdown", "json"]),
        )
        .arg(clap::arg!(--frontmatter "Include TOML frontmatter (Markdown only)"))
        .arg(
            clap::arg!(-o --output <FILE> "Output file (default: stdout)")
                .value_name("FILE")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(--timeout <SECS> "HTTP timeout in seconds").default_value("30"))
        .arg(clap::arg!(--min_size <CHARS> "Minimum length of the extracted markdown").default_value("100"))
        .arg(clap::arg!(--favor_recall "Keep more of the page instead of dropping link-heavy blocks"))
        .arg(clap::arg!(--no_images "Strip images from output"))
        .arg(
            clap::arg!(--debug_dir <DIR> "Write the raw HTML and rendered markdown into this directory")
                .value_name("DIR")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .arg(clap::arg!(-v --verbose "Enable debug logging"));

    for shell in [
        clap_complete::Shell::Bash,
        clap_complete::Shell::Zsh,
        clap_complete::Shell::Fish,
        clap_complete::Shell::PowerShell,
    ] {
        clap_complete::generate_to(shell, &mut cmd, "longreader", &completions_dir).unwrap();
    }

    println!(
        "cargo:warning=Shell completions generated in: {}",
        completions_dir.display()
    );
}
