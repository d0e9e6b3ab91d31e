// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Options shared by the driver and tool subcommands
fn common_args() -> Vec<Arg> {
    vec![
        Arg::new("output_dir")
            .short('o')
            .long("output-dir")
            .value_name("DIR")
            .help("Output directory (default: ./output/<YYYY-MM-DD_HH-MM-SS>)"),
        Arg::new("pkg_release")
            .short('r')
            .long("pkg-release")
            .value_name("RELEASE")
            .help("Package release (default: YYYYMMDD)"),
        Arg::new("verbose")
            .short('V')
            .long("verbose")
            .action(ArgAction::SetTrue)
            .help("Debug-level logging"),
        Arg::new("force")
            .short('f')
            .long("force")
            .action(ArgAction::SetTrue)
            .help("Remove the output directory if it exists"),
        Arg::new("no_gen_version")
            .short('g')
            .long("no-gen-version")
            .action(ArgAction::SetTrue)
            .help("Skip the version generation scripts"),
        Arg::new("project_dir")
            .short('p')
            .long("project-dir")
            .value_name("DIR")
            .default_value(".")
            .help("Project checkout"),
        Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .help("TOML file overriding the built-in configuration"),
    ]
}

fn build_cli() -> Command {
    Command::new("drvpkg")
        .version(env!("CARGO_PKG_VERSION"))
        .author("drvpkg Contributors")
        .about("Build Debian packages for the AMI driver and tool")
        .disable_version_flag(true)
        .arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .action(ArgAction::Version)
                .help("Print version"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("driver")
                .about("Build the DKMS driver source package")
                .args(common_args())
                .arg(
                    Arg::new("no_driver")
                        .short('n')
                        .long("no-driver")
                        .action(ArgAction::SetTrue)
                        .help("Skip the driver compilation confidence check"),
                ),
        )
        .subcommand(
            Command::new("tool")
                .about("Build the ami_tool package")
                .args(common_args()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = manifest_dir.join("man").join("drvpkg.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
