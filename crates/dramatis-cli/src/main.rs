use anyhow::{Context, Result, bail};
use dramatis_config::Config;
use dramatis_engine::{
    BlockMatchup, MatchupOptions, NarratorOverrides, ReferenceText, ReferenceTextSource, read_book,
    read_narrator_overrides, read_reference_text, write_book,
};
use std::{
    env,
    path::{Path, PathBuf},
    process,
};

const USAGE: &str = "\
Usage:
  dramatis align <book.json> [out.json]
  dramatis reconcile <saved.json> <parsed.json> [out.json]
  dramatis joined <book.json>";

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let Some((command, paths)) = args.split_first() else {
        bail!("no command given\n{USAGE}");
    };
    let paths: Vec<PathBuf> = paths.iter().map(PathBuf::from).collect();

    match (command.as_str(), paths.as_slice()) {
        ("align", [book]) => align(book, book),
        ("align", [book, out]) => align(book, out),
        ("reconcile", [saved, parsed]) => reconcile(saved, parsed, parsed),
        ("reconcile", [saved, parsed, out]) => reconcile(saved, parsed, out),
        ("joined", [book]) => joined(book),
        _ => bail!("unrecognised arguments\n{USAGE}"),
    }
}

fn load_config() -> Result<Config> {
    let config_path = Config::config_path();
    log::info!("Config path: {}", config_path.display());
    match Config::load()? {
        Some(config) => Ok(config),
        None => bail!("no config file found; create one at {}", config_path.display()),
    }
}

fn load_reference_text(config: &Config) -> Result<ReferenceText> {
    read_reference_text(&config.reference_text_path).with_context(|| {
        format!(
            "reading reference text {}",
            config.reference_text_path.display()
        )
    })
}

/// Auto-align every window of the book and commit the fully matched ones.
fn align(book_path: &Path, out_path: &Path) -> Result<()> {
    let config = load_config()?;
    let reference = load_reference_text(&config)?;
    let mut book = read_book(book_path).with_context(|| format!("reading {}", book_path.display()))?;

    let mut index = 0;
    let (mut applied, mut skipped) = (0, 0);
    while index < book.len() {
        let mut matchup = BlockMatchup::new(&book, index, &reference, MatchupOptions::new())?;
        let start = matchup.index_of_start_block_in_book();

        if config
            .max_matchup_blocks
            .is_some_and(|max| matchup.original_block_count() > max)
        {
            log::warn!(
                "skipping blocks {start}..{}: window larger than {:?} blocks",
                start + matchup.original_block_count(),
                config.max_matchup_blocks
            );
            skipped += 1;
        } else {
            matchup.match_all_blocks(config.dialogue_quote_mark());
            match matchup.apply(&mut book) {
                Ok(()) => applied += 1,
                Err(e) => {
                    log::warn!("not applying blocks starting at {start}: {e}");
                    skipped += 1;
                }
            }
        }
        index = start + matchup.correlated_blocks().len().max(1);
    }

    write_book(out_path, &book).with_context(|| format!("writing {}", out_path.display()))?;
    log::info!(
        "aligned {} ({applied} windows applied, {skipped} left for review)",
        book.book_id()
    );
    Ok(())
}

/// Carry the decisions saved in one version of a book over to a new parse.
fn reconcile(saved_path: &Path, parsed_path: &Path, out_path: &Path) -> Result<()> {
    let saved = read_book(saved_path).with_context(|| format!("reading {}", saved_path.display()))?;
    let mut parsed =
        read_book(parsed_path).with_context(|| format!("reading {}", parsed_path.display()))?;

    // Without a config the regions are judged on verse starts alone
    let reference = match Config::load()? {
        Some(config) => Some(load_reference_text(&config)?),
        None => None,
    };
    parsed.apply_user_decisions(
        &saved,
        reference.as_ref().map(|r| r as &dyn ReferenceTextSource),
    );

    for split in parsed.unapplied_splits() {
        let first = split.pieces.first();
        println!(
            "unapplied split at {}:{}",
            first.map_or(0, |p| p.chapter_number),
            first.map_or(0, |p| p.initial_start_verse)
        );
    }
    write_book(out_path, &parsed).with_context(|| format!("writing {}", out_path.display()))?;
    Ok(())
}

/// Print the book as a reader would hear it: one line per joined block.
fn joined(book_path: &Path) -> Result<()> {
    let book = read_book(book_path).with_context(|| format!("reading {}", book_path.display()))?;
    let overrides = match Config::load()? {
        Some(config) if config.apply_narrator_overrides => match &config.narrator_overrides_path {
            Some(path) => Some(
                read_narrator_overrides(path)
                    .with_context(|| format!("reading narrator overrides {}", path.display()))?,
            ),
            None => Some(NarratorOverrides::default()),
        },
        _ => None,
    };

    for block in book.joined_blocks(overrides.as_ref()).blocks() {
        println!(
            "{} {}:{}\t{}\t{}",
            book.book_id(),
            block.chapter_number,
            block.initial_verse(),
            block.character_id_in_script(),
            block.text(true)
        );
    }
    Ok(())
}
