use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docx_patcher::config::{init_default_config, resolve_config, AppConfig};
use docx_patcher::docx::package::DocxPackage;
use docx_patcher::docx::structure::{default_structure_output_for, extract_structure_json};
use docx_patcher::docx::xml::{parse_xml_part, write_xml_part};
use docx_patcher::{apply_patches_with, parse_patches, verify_untouched, PatchMap};

#[derive(Parser, Debug)]
#[command(name = "docx-patcher")]
#[command(about = "Extract addressable DOCX structure and apply format-preserving text patches", long_about = None)]
struct Args {
    /// Write a default docx-patcher.toml, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Input .docx
    #[arg(value_name = "DOCX")]
    input: Option<PathBuf>,

    /// Output .docx for --apply-patches (default: <input_stem>_patched.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Config file path (default: $DOCX_PATCHER_CONFIG, then docx-patcher.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the element structure as JSON to this path
    #[arg(long, value_name = "JSON")]
    extract_structure_json: Option<PathBuf>,

    /// Write the element structure to <input_stem>.structure.json
    #[arg(long, conflicts_with = "extract_structure_json")]
    extract_structure: bool,

    /// Apply a JSON array of {element_id, new_content} patches
    #[arg(long, value_name = "JSON")]
    apply_patches: Option<PathBuf>,

    /// After patching, check that elements outside the patch set are unchanged
    #[arg(long, requires = "apply_patches")]
    verify_untouched: bool,

    /// Only parse + re-serialize every XML part (no patching)
    #[arg(long)]
    roundtrip_only: bool,
}

fn init_logging(cfg: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", path.display());
        return Ok(());
    }

    let workdir = args
        .input
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let (cfg, cfg_path) = resolve_config(args.config.as_deref(), &workdir).context("load config")?;
    init_logging(&cfg);
    if let Some(p) = cfg_path.as_ref() {
        info!(config = %p.display(), "loaded config");
    }

    let input = match args.input {
        Some(p) => p,
        None => {
            let mut cmd = Args::command();
            cmd.print_help().context("print help")?;
            eprintln!(
                "\n\nUSAGE:\n  docx-patcher <input.docx> --extract-structure-json out.json\n  docx-patcher <input.docx> --apply-patches patches.json [-o out.docx]\n"
            );
            return Ok(());
        }
    };

    if args.roundtrip_only {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_for(&input, "_roundtrip"));
        roundtrip(&input, &output)?;
        return Ok(());
    }

    let structure_json = args.extract_structure_json.clone().or_else(|| {
        args.extract_structure
            .then(|| default_structure_output_for(&input).structure_json_path)
    });
    if let Some(json) = structure_json {
        extract_structure_json(&input, &json, cfg.pretty_json())
            .with_context(|| format!("extract structure: {}", input.display()))?;
    }

    if let Some(patches_path) = args.apply_patches.as_ref() {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_for(&input, cfg.output_suffix()));
        let original =
            std::fs::read(&input).with_context(|| format!("read docx: {}", input.display()))?;
        let patch_json = std::fs::read(patches_path)
            .with_context(|| format!("read patches: {}", patches_path.display()))?;
        let patches = parse_patches(&patch_json)
            .with_context(|| format!("parse patches: {}", patches_path.display()))?;

        let (patched, report) = apply_patches_with(&original, &patches, &cfg.format_policy())
            .with_context(|| format!("apply patches: {}", input.display()))?;
        if args.verify_untouched {
            verify_untouched(&original, &patched, &PatchMap::from_patches(&patches))
                .context("verify untouched elements")?;
        }
        std::fs::write(&output, &patched)
            .with_context(|| format!("write docx: {}", output.display()))?;
        info!(
            output = %output.display(),
            applied = report.applied.len(),
            unmatched = report.unmatched.len(),
            malformed_ids = report.malformed_ids.len(),
            skipped_attributes = report.skipped_attributes,
            "wrote patched document"
        );
    }

    Ok(())
}

fn roundtrip(input: &Path, output: &Path) -> anyhow::Result<()> {
    let pkg = DocxPackage::read(input).with_context(|| format!("open docx: {}", input.display()))?;
    let mut replacements: HashMap<String, Vec<u8>> = HashMap::new();
    for ent in pkg.xml_entries() {
        if ent.data.is_empty() {
            continue;
        }
        let part =
            parse_xml_part(&ent.name, &ent.data).with_context(|| format!("parse xml: {}", ent.name))?;
        let bytes = write_xml_part(&part).with_context(|| format!("serialize xml: {}", ent.name))?;
        replacements.insert(ent.name.clone(), bytes);
    }
    let bytes = pkg.write_with_replacements(&replacements)?;
    std::fs::write(output, bytes).with_context(|| format!("write docx: {}", output.display()))?;
    Ok(())
}

fn default_output_for(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
        .to_string();
    input.with_file_name(format!("{stem}{suffix}.docx"))
}
