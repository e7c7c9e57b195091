use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use model::{CanvasSize, Color, Rect};
use photolite::{Editor, EditorConfig, logging};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Layered raster project tool")]
struct Arguments {
    /// Settings file (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,
    /// Log at debug level regardless of RUST_LOG and the config.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a project holding only the background layer
    New {
        output: PathBuf,
        #[arg(long)]
        width: Option<i64>,
        #[arg(long)]
        height: Option<i64>,
        #[arg(long, value_enum, default_value = "white")]
        background: BackgroundFill,
        #[arg(long, default_value = document::DEFAULT_PROJECT_NAME)]
        name: String,
    },
    /// Print name, size, dates and layers of a project
    Info { project: PathBuf },
    /// Composite a project to an 8-bit RGBA PNG
    Export {
        project: PathBuf,
        output: PathBuf,
        /// Canvas region as x,y,width,height.
        #[arg(long, value_parser = parse_rect)]
        rect: Option<Rect>,
    },
    /// Add an image as a new top layer, creating the project from the image
    /// when it does not exist yet
    Import { image: PathBuf, project: PathBuf },
    /// Add the flattened canvas as a new top layer and save
    Flatten {
        project: PathBuf,
        /// Save to this path instead of overwriting the project.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum BackgroundFill {
    Transparent,
    White,
    Red,
    Black,
}

impl BackgroundFill {
    fn color(self) -> Color {
        match self {
            BackgroundFill::Transparent => Color::TRANSPARENT,
            BackgroundFill::White => Color::WHITE,
            BackgroundFill::Red => Color::RED,
            BackgroundFill::Black => Color::BLACK,
        }
    }
}

fn parse_rect(value: &str) -> Result<Rect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| format!("invalid rect component: {error}"))?;
    let [x, y, width, height] = parts[..] else {
        return Err(format!("expected x,y,width,height, got {value:?}"));
    };
    let x = i32::try_from(x).map_err(|_| format!("x {x} out of range"))?;
    let y = i32::try_from(y).map_err(|_| format!("y {y} out of range"))?;
    Rect::new(x, y, width, height).map_err(|error| error.to_string())
}

fn main() -> Result<()> {
    let arguments = Arguments::parse();
    let config = EditorConfig::load_or_default(arguments.config.as_deref())
        .context("load editor config")?;
    logging::init(arguments.verbose, &config.log_level);

    match arguments.command {
        Command::New {
            output,
            width,
            height,
            background,
            name,
        } => create(&config, &output, width, height, background, &name),
        Command::Info { project } => {
            let editor = open(&project, &config)?;
            print!("{}", editor.document_info());
            if let Some(advisory) = editor.version_advisory() {
                println!("Warning: {advisory}");
            }
            Ok(())
        }
        Command::Export {
            project,
            output,
            rect,
        } => {
            let editor = open(&project, &config)?;
            editor
                .export_png_to_path(rect, &output)
                .with_context(|| format!("export {}", output.display()))
        }
        Command::Import { image, project } => import(&config, &image, &project),
        Command::Flatten { project, output } => {
            let mut editor = open(&project, &config)?;
            editor.add_composite_layer();
            let target = output.unwrap_or(project);
            let saved = editor
                .save_as(&target)
                .with_context(|| format!("save {}", target.display()))?;
            info!(path = %saved.display(), "flattened project saved");
            Ok(())
        }
    }
}

fn open(project: &Path, config: &EditorConfig) -> Result<Editor> {
    Editor::open(project, config).with_context(|| format!("open {}", project.display()))
}

fn create(
    config: &EditorConfig,
    output: &Path,
    width: Option<i64>,
    height: Option<i64>,
    background: BackgroundFill,
    name: &str,
) -> Result<()> {
    let canvas = CanvasSize::new(
        width.unwrap_or(i64::from(config.canvas.width)),
        height.unwrap_or(i64::from(config.canvas.height)),
    )
    .context("invalid canvas size")?;
    let mut editor = Editor::create(config, name, Some(canvas), background.color())?;
    let saved = editor
        .save_as(output)
        .with_context(|| format!("save {}", output.display()))?;
    println!("{}", saved.display());
    Ok(())
}

fn import(config: &EditorConfig, image: &Path, project: &Path) -> Result<()> {
    let mut editor = if project.exists() {
        let mut editor = open(project, config)?;
        editor
            .import_image_layer(image)
            .with_context(|| format!("import {}", image.display()))?;
        editor
    } else {
        Editor::from_image(image, config).with_context(|| format!("import {}", image.display()))?
    };
    let saved = editor
        .save_as(project)
        .with_context(|| format!("save {}", project.display()))?;
    info!(path = %saved.display(), "image imported");
    Ok(())
}
