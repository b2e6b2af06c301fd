use clap::{Parser, Subcommand};
use patchfill::image::color::{image_to_lab, image_to_rgb};
use patchfill::image::io::{load_mask, load_rgb_image, save_rgb_image};
use patchfill::{
    FillConfig, HoleFilling, PatchMatchProvider, RandomizedPatchMatch, SearchConfig, VoteConfig,
    VotedReconstruction,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "PatchFill CLI: patch-based hole filling and reconstruction")]
struct Cli {
    /// Path to an optional JSON configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fill a masked hole region with content from the rest of the image.
    Fill {
        /// Input image.
        image: PathBuf,
        /// Hole mask; any nonzero pixel marks a hole.
        mask: PathBuf,
        /// Output image path.
        output: PathBuf,
        /// Prefix for offset-map diagnostic dumps.
        #[arg(long, value_name = "PREFIX")]
        dump_offsets: Option<String>,
    },
    /// Reconstruct the target image from patches of the source image.
    Reconstruct {
        /// Image to borrow patches from.
        source: PathBuf,
        /// Image to reconstruct.
        target: PathBuf,
        /// Output image path.
        output: PathBuf,
    },
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct SearchConfigJson {
    iterations_per_scale: usize,
    alpha: f32,
    lambda: f32,
    random_search: bool,
    merge_upsampled: bool,
    parallel: bool,
}

impl Default for SearchConfigJson {
    fn default() -> Self {
        let cfg = SearchConfig::default();
        Self {
            iterations_per_scale: cfg.iterations_per_scale,
            alpha: cfg.alpha,
            lambda: cfg.lambda,
            random_search: cfg.random_search,
            merge_upsampled: cfg.merge_upsampled,
            parallel: cfg.parallel,
        }
    }
}

impl From<&SearchConfigJson> for SearchConfig {
    fn from(value: &SearchConfigJson) -> Self {
        Self {
            iterations_per_scale: value.iterations_per_scale,
            alpha: value.alpha,
            lambda: value.lambda,
            random_search: value.random_search,
            merge_upsampled: value.merge_upsampled,
            parallel: value.parallel,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct VoteConfigJson {
    weighted_by_similarity: bool,
    mode_seeking: bool,
    bandwidth_scale: f32,
    parallel: bool,
}

impl Default for VoteConfigJson {
    fn default() -> Self {
        let cfg = VoteConfig::default();
        Self {
            weighted_by_similarity: cfg.weighted_by_similarity,
            mode_seeking: cfg.mode_seeking,
            bandwidth_scale: cfg.bandwidth_scale,
            parallel: cfg.parallel,
        }
    }
}

impl From<&VoteConfigJson> for VoteConfig {
    fn from(value: &VoteConfigJson) -> Self {
        Self {
            weighted_by_similarity: value.weighted_by_similarity,
            mode_seeking: value.mode_seeking,
            bandwidth_scale: value.bandwidth_scale,
            parallel: value.parallel,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
struct Config {
    patch_size: usize,
    em_steps: usize,
    wexler_upsample: bool,
    search: SearchConfigJson,
    vote: VoteConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        let cfg = FillConfig::default();
        Self {
            patch_size: cfg.patch_size,
            em_steps: cfg.em_steps,
            wexler_upsample: cfg.wexler_upsample,
            search: SearchConfigJson::default(),
            vote: VoteConfigJson {
                mode_seeking: cfg.vote.mode_seeking,
                ..VoteConfigJson::default()
            },
        }
    }
}

impl Config {
    fn to_fill_config(&self) -> FillConfig {
        FillConfig {
            patch_size: self.patch_size,
            em_steps: self.em_steps,
            wexler_upsample: self.wexler_upsample,
            search: (&self.search).into(),
            vote: (&self.vote).into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Output {
    summed_distance: f64,
    percentile75_distance: f32,
    grid_width: usize,
    grid_height: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("patchfill=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_example {
        println!("{}", serde_json::to_string_pretty(&Config::default())?);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    let command = cli.command.ok_or("no command given; see --help")?;
    match command {
        Command::Fill {
            image,
            mask,
            output,
            dump_offsets,
        } => {
            let rgb = load_rgb_image(&image)?;
            let hole = load_mask(&mask)?;
            let lab = image_to_lab(&rgb)?;

            let mut filler = HoleFilling::new(&lab, &hole, config.to_fill_config())?;
            let filled = filler.run()?;

            if let Some(prefix) = dump_offsets {
                if let Some(map) = filler.offset_map() {
                    save_rgb_image(
                        format!("{prefix}_offsets.png"),
                        &map.to_color_coded_image(),
                    )?;
                }
            }

            save_rgb_image(&output, &image_to_rgb(&filled)?)?;
            if let Some(map) = filler.offset_map() {
                print_stats(map);
            }
        }
        Command::Reconstruct {
            source,
            target,
            output,
        } => {
            let source_lab = image_to_lab(&load_rgb_image(&source)?)?;
            let target_lab = image_to_lab(&load_rgb_image(&target)?)?;

            let mut search = RandomizedPatchMatch::new(
                &source_lab,
                target_lab.width(),
                target_lab.height(),
                config.patch_size,
                (&config.search).into(),
            )?;
            search.set_target_area(&target_lab)?;
            let map = search.match_offsets()?;

            let reconstruction = VotedReconstruction::new(
                &map,
                &source_lab,
                config.patch_size,
                (&config.vote).into(),
            )?
            .reconstruct(None)?;

            save_rgb_image(&output, &image_to_rgb(&reconstruction)?)?;
            print_stats(&map);
        }
    }

    Ok(())
}

fn print_stats(map: &patchfill::OffsetMap) {
    let stats = Output {
        summed_distance: map.summed_distance(),
        percentile75_distance: map.percentile75_distance(),
        grid_width: map.width(),
        grid_height: map.height(),
    };
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize stats: {err}"),
    }
}
