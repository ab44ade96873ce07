use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use doc_model::{
    apply_viewer_action, Selection, ViewerAction, ViewerState, ViewportPoint, Zoom,
};
use pdf_engine::{default_engine, LoadedDocument, OpenSource, PdfEngine};
use redpen_core::{
    analyze_document, export_document, parse_response, write_annotations, AnalysisConfig,
    Annotation, AnnotationKind, AnnotationStore, AutoPlacer, ChatCompletionsClient,
    ExportOptions, ExportRequest, SelectionRequest, SuggestionRecord, TextRun, TextRunIndex,
};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "redpen")]
#[command(about = "Review annotations for PDF documents")]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print positioned text per page.
    Text {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only this 1-based page.
        #[arg(long)]
        page: Option<u32>,
        /// Include individual text runs.
        #[arg(long)]
        runs: bool,
    },
    /// Ask the analysis model for review suggestions.
    Analyze {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Document name shown to the model; defaults to the file name.
        #[arg(long)]
        name: Option<String>,
        #[arg(long, env = "REDPEN_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Also place the suggestions as comment annotations.
        #[arg(long)]
        place: bool,
    },
    /// Parse a delimited suggestion block ("-" reads stdin).
    Parse {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
    /// Place parsed suggestions on a document's pages.
    Place {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// JSON array of suggestion records, as printed by `parse`.
        #[arg(long)]
        suggestions: PathBuf,
        #[arg(long)]
        author: Option<String>,
    },
    /// Create an annotation from a drag selection over the rendered page.
    Annotate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Drag start in viewport pixels, `x,y`.
        #[arg(long, value_parser = parse_point)]
        from: ViewportPoint,
        /// Drag end in viewport pixels, `x,y`.
        #[arg(long, value_parser = parse_point)]
        to: ViewportPoint,
        /// Zoom the selection was made at; defaults to the stored preference.
        #[arg(long)]
        zoom: Option<f32>,
        #[arg(long, default_value = "highlight")]
        kind: AnnotationKind,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        author: Option<String>,
        /// Annotation JSON file to append to; printed to stdout when absent.
        #[arg(long)]
        annotations: Option<PathBuf>,
    },
    /// Write annotations into a PDF.
    Export {
        /// A PDF path, or the identifier of a stored document.
        #[arg(value_name = "DOCUMENT")]
        document: String,
        /// JSON array of annotations.
        #[arg(long)]
        annotations: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Title recorded in the document info dictionary.
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        no_appearance: bool,
        #[arg(long)]
        no_rich_text: bool,
    },
    /// Copy a PDF into the document store.
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List stored documents.
    Documents,
    /// Show or change stored preferences.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Set {
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        zoom: Option<f32>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct PageTextOutput {
    page: u32,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Serialize)]
struct AnalyzeOutput {
    #[serde(flatten)]
    outcome: redpen_core::AnalysisOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotations: Option<Vec<Annotation>>,
}

#[derive(Debug, Serialize)]
struct ExportOutput {
    output: String,
    written: usize,
    skipped: usize,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Text { file, page, runs } => run_text(&file, page, runs),
        Commands::Analyze { file, name, api_key, base_url, model, place } => {
            let mut config = AnalysisConfig::from_env(&open_storage()?.load_preferences()?);
            if let Some(api_key) = api_key {
                config = config.with_api_key(api_key);
            }
            if let Some(base_url) = base_url {
                config = config.with_base_url(base_url);
            }
            if let Some(model) = model {
                config = config.with_model(model);
            }
            run_analyze(&file, name, &config, place)
        }
        Commands::Parse { input } => run_parse(&input),
        Commands::Place { file, suggestions, author } => {
            run_place(&file, &suggestions, author.as_deref())
        }
        Commands::Annotate { file, page, from, to, zoom, kind, content, author, annotations } => {
            let selection = Selection::new(from, to);
            run_annotate(&file, page, selection, zoom, kind, content, author, annotations.as_deref())
        }
        Commands::Export { document, annotations, output, title, no_appearance, no_rich_text } => {
            let options = ExportOptions {
                appearance_streams: !no_appearance,
                rich_text: !no_rich_text,
                title,
                ..ExportOptions::default()
            };
            run_export(&document, &annotations, output.as_deref(), options)
        }
        Commands::Import { file } => {
            ensure_pdf_exists(&file)?;
            let id = open_storage()?.import_document(&file).context("failed to import document")?;
            println!("{id}");
            Ok(())
        }
        Commands::Documents => {
            let ids = open_storage()?.list_documents()?;
            print_json(&ids)
        }
        Commands::Config { action } => run_config(action),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_storage() -> Result<Storage> {
    Storage::from_env().context("failed to resolve storage directory")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let first_page_size_pt = if page_count > 0 {
        let size = engine.page_size(handle, 0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };
    print_json(&payload)?;

    engine.close(handle)?;

    Ok(())
}

fn load_document(file: &Path) -> Result<LoadedDocument> {
    ensure_pdf_exists(file)?;
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    LoadedDocument::from_bytes(&bytes).context("failed to open PDF")
}

fn run_text(file: &Path, page: Option<u32>, include_runs: bool) -> Result<()> {
    let index = TextRunIndex::new(load_document(file)?);
    let page_count = index.page_count();

    let pages: Vec<u32> = match page {
        Some(page) if page == 0 || page > page_count => {
            anyhow::bail!("--page must be between 1 and {page_count}")
        }
        Some(page) => vec![page],
        None => (1..=page_count).collect(),
    };

    let output: Vec<PageTextOutput> = pages
        .into_iter()
        .map(|page| {
            let runs = index.page(page);
            PageTextOutput {
                page,
                text: runs.text(),
                runs: include_runs.then(|| runs.runs().to_vec()),
            }
        })
        .collect();

    print_json(&output)
}

fn run_analyze(file: &Path, name: Option<String>, config: &AnalysisConfig, place: bool) -> Result<()> {
    let index = TextRunIndex::new(load_document(file)?);
    let name = name.unwrap_or_else(|| file_name(file));

    let outcome = analyze_document(&ChatCompletionsClient::new(), config, &index.document_text(), &name)
        .with_context(|| format!("analysis of {name} failed"))?;

    let annotations = place.then(|| {
        AutoPlacer::new().with_page_count(index.page_count()).place(&index, &outcome.suggestions)
    });

    print_json(&AnalyzeOutput { outcome, annotations })
}

fn run_parse(input: &Path) -> Result<()> {
    let block = if input == Path::new("-") {
        let mut block = String::new();
        std::io::stdin().read_to_string(&mut block).context("failed to read stdin")?;
        block
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?
    };

    let records = parse_response(&block)?;
    print_json(&records)
}

fn run_place(file: &Path, suggestions: &Path, author: Option<&str>) -> Result<()> {
    let records: Vec<SuggestionRecord> = read_json(suggestions)?;
    let index = TextRunIndex::new(load_document(file)?);

    let mut placer = AutoPlacer::new().with_page_count(index.page_count());
    if let Some(author) = author {
        placer = placer.with_author(author);
    }

    let mut store = AnnotationStore::new();
    placer.place_into(&index, &records, &mut store);
    print_json(store.as_slice())
}

#[allow(clippy::too_many_arguments)]
fn run_annotate(
    file: &Path,
    page: u32,
    selection: Selection,
    zoom: Option<f32>,
    kind: AnnotationKind,
    content: Option<String>,
    author: Option<String>,
    annotations: Option<&Path>,
) -> Result<()> {
    if !selection.is_actionable() {
        anyhow::bail!("selection is too small; drag at least 10 pixels on both axes");
    }

    let preferences = open_storage()?.load_preferences()?;
    let index = TextRunIndex::new(load_document(file)?);

    let zoom = match zoom {
        Some(factor) => Zoom::new(factor)?,
        None => preferences.default_zoom,
    };
    let mut viewer = ViewerState::for_document(index.page_count(), zoom);
    apply_viewer_action(&mut viewer, ViewerAction::GoToPage(page));
    if viewer.current_page != page {
        anyhow::bail!("page {page} is outside the document (1..={})", index.page_count());
    }

    let mut store = match annotations.filter(|path| path.exists()) {
        Some(path) => AnnotationStore::from(read_json::<Vec<Annotation>>(path)?),
        None => AnnotationStore::new(),
    };

    let selected_text = index.text_in_region(page, &selection.document_rect(viewer.zoom));
    let id = store.create_from_selection(SelectionRequest {
        page,
        viewport_rect: selection.viewport_rect(),
        zoom: viewer.zoom,
        kind,
        selected_text,
        content,
        author: author.unwrap_or(preferences.default_author),
    })?;

    match annotations {
        Some(path) => {
            let json = serde_json::to_vec_pretty(store.as_slice())?;
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            println!("{id}");
            Ok(())
        }
        None => print_json(&store.get(id)),
    }
}

fn run_export(
    document: &str,
    annotations: &Path,
    output: Option<&Path>,
    options: ExportOptions,
) -> Result<()> {
    let annotations: Vec<Annotation> = read_json(annotations)?;
    let path = Path::new(document);

    let (written, skipped, output) = if path.is_file() {
        if annotations.is_empty() {
            anyhow::bail!("no annotations to export");
        }
        let source = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let outcome = write_annotations(&source, &annotations, &options)
            .with_context(|| format!("failed to export {}", path.display()))?;
        let output = output.map(ToOwned::to_owned).unwrap_or_else(|| annotated_path(path));
        write_output(&output, &outcome.bytes)?;
        (outcome.written, outcome.skipped, output)
    } else {
        let storage = open_storage()?;
        let request = ExportRequest::new(document, annotations).with_options(options);
        let outcome = export_document(&storage, &request)
            .with_context(|| format!("failed to export {document}"))?;
        let output = match output {
            Some(path) => {
                write_output(path, &outcome.bytes)?;
                path.to_owned()
            }
            None => storage.write_export(document, &outcome.bytes)?,
        };
        (outcome.written, outcome.skipped, output)
    };

    tracing::info!(output = %output.display(), written, skipped, "annotated PDF written");
    print_json(&ExportOutput { output: output.display().to_string(), written, skipped })
}

fn write_output(output: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, bytes).with_context(|| format!("failed to write {}", output.display()))
}

fn run_config(action: ConfigAction) -> Result<()> {
    let storage = open_storage()?;
    let mut preferences = storage.load_preferences()?;

    if let ConfigAction::Set { author, zoom, base_url, model } = action {
        if let Some(author) = author {
            preferences.default_author = author;
        }
        if let Some(zoom) = zoom {
            preferences.default_zoom = Zoom::new(zoom)?;
        }
        if let Some(base_url) = base_url {
            preferences.analysis_base_url = Some(base_url);
        }
        if let Some(model) = model {
            preferences.analysis_model = Some(model);
        }
        storage.save_preferences(&preferences).context("failed to save preferences")?;
    }

    print_json(&preferences)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn parse_point(value: &str) -> Result<ViewportPoint, String> {
    let (x, y) = value.split_once(',').ok_or_else(|| format!("expected `x,y`, got {value:?}"))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("invalid x coordinate in {value:?}"))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("invalid y coordinate in {value:?}"))?;
    Ok(ViewportPoint::new(x, y))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn file_name(file: &Path) -> String {
    file.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| file.display().to_string())
}

fn annotated_path(file: &Path) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("document");

    file.with_file_name(format!("{stem}_annotated.pdf"))
}
