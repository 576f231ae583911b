//! Corpus loading from PGN movetext

use pgn_reader::{RawTag, SanPlus, Skip, Visitor};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::ops::ControlFlow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::tier::Tier;

/// One historical game as it appeared in a tier corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    pub tier: Tier,
    /// Where the game came from (Site/Event tag, or tier and ordinal)
    pub source: String,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    /// Move notations in play order, move numbers and annotations removed
    pub moves: Vec<String>,
}

impl GameRecord {
    pub fn ply_count(&self) -> usize {
        self.moves.len()
    }
}

/// Output of loading one tier's movetext
#[derive(Debug, Clone, Default)]
pub struct LoadedCorpus {
    pub games: Vec<GameRecord>,
    /// Games dropped because no move could be read from them
    pub skipped: usize,
}

#[derive(Default)]
struct GameTags {
    event: Option<String>,
    site: Option<String>,
    white: Option<String>,
    black: Option<String>,
    result: Option<String>,
}

struct GameMoves {
    tags: GameTags,
    moves: Vec<String>,
}

struct ParsedGame {
    tags: GameTags,
    moves: Vec<String>,
}

struct GameParser;

impl Visitor for GameParser {
    type Tags = GameTags;
    type Movetext = GameMoves;
    type Output = Option<ParsedGame>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value_str = value.decode_utf8_lossy().trim().to_string();
        // "?" is the PGN placeholder for an unknown value
        let value_opt = if value_str.is_empty() || value_str == "?" {
            None
        } else {
            Some(value_str)
        };

        match name {
            b"Event" => tags.event = value_opt,
            b"Site" => tags.site = value_opt,
            b"White" => tags.white = value_opt,
            b"Black" => tags.black = value_opt,
            b"Result" => tags.result = value_opt,
            _ => {}
        }

        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(GameMoves {
            tags,
            moves: Vec::new(),
        })
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        // Legality is the replay stage's concern; the loader only tokenises.
        movetext.moves.push(san.to_string());
        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        if movetext.moves.is_empty() {
            None
        } else {
            Some(ParsedGame {
                tags: movetext.tags,
                moves: movetext.moves,
            })
        }
    }
}

/// Splits a tier's movetext blob into games.
///
/// Games are delimited the PGN way: a game's movetext runs until the next
/// tag section, so untagged games must not be concatenated in one blob.
///
/// Never fails: games without a single readable move are dropped and
/// counted in [`LoadedCorpus::skipped`]. A reader failure ends the scan,
/// keeps what was read so far and counts as one more skipped game.
pub fn load_corpus(tier: &Tier, movetext: &str) -> LoadedCorpus {
    scan(tier, movetext, || false).0
}

/// [`load_corpus`] that checks `cancel` before each game and returns
/// [`Error::Cancelled`] once it fires.
pub fn load_corpus_cancellable(
    tier: &Tier,
    movetext: &str,
    cancel: &CancellationToken,
) -> Result<LoadedCorpus> {
    match scan(tier, movetext, || cancel.is_cancelled()) {
        (_, true) => Err(Error::Cancelled),
        (corpus, false) => Ok(corpus),
    }
}

/// Returns the corpus and whether `stop` cut the scan short
fn scan(tier: &Tier, movetext: &str, stop: impl Fn() -> bool) -> (LoadedCorpus, bool) {
    let mut parser = GameParser;
    let mut corpus = LoadedCorpus::default();
    let mut ordinal = 0usize;

    let cursor = Cursor::new(movetext.as_bytes());
    let mut reader = pgn_reader::Reader::new(cursor);

    loop {
        if stop() {
            return (corpus, true);
        }
        match reader.read_game(&mut parser) {
            Ok(Some(maybe_game)) => {
                ordinal += 1;
                match maybe_game {
                    Some(game) => corpus.games.push(into_record(tier, ordinal, game)),
                    None => {
                        debug!(tier = %tier, game = ordinal, "Skipping game without moves");
                        corpus.skipped += 1;
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(
                    tier = %tier,
                    game = ordinal + 1,
                    error = %e,
                    "Corpus reader failed, keeping games read so far"
                );
                corpus.skipped += 1;
                break;
            }
        }
    }

    (corpus, false)
}

fn into_record(tier: &Tier, ordinal: usize, game: ParsedGame) -> GameRecord {
    let ParsedGame { tags, moves } = game;
    let source = tags
        .site
        .or(tags.event)
        .unwrap_or_else(|| format!("{}#{}", tier, ordinal));

    GameRecord {
        tier: tier.clone(),
        source,
        white: tags.white,
        black: tags.black,
        result: tags.result,
        moves,
    }
}
