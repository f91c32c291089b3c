//! The operator profile: a TOML file layered with `DIWAN_*` environment
//! variables, deserialized through the `config` crate.

use std::{collections::HashMap, path::PathBuf};

use serde::Deserialize;

fn default_store_path() -> PathBuf {
  PathBuf::from("diwan.db")
}

fn default_actor() -> String {
  "system".to_owned()
}

fn default_chunk_size() -> usize {
  16
}

fn default_feed_encoding() -> String {
  diwan_sheets::DEFAULT_FEED_ENCODING.to_owned()
}

fn default_card_min() -> usize {
  8
}

fn default_card_max() -> usize {
  16
}

/// Worksheet selection for one import kind. A named sheet wins over the
/// index; the header row accommodates files with a title row above it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetProfile {
  pub sheet_name:  Option<String>,
  #[serde(default)]
  pub sheet_index: usize,
  #[serde(default)]
  pub header_row:  usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetProfiles {
  #[serde(default)]
  pub salaries: SheetProfile,
  #[serde(default)]
  pub yearly:   SheetProfile,
  #[serde(default)]
  pub leave:    SheetProfile,
  #[serde(default)]
  pub patch:    SheetProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CardLength {
  #[serde(default = "default_card_min")]
  pub min: usize,
  #[serde(default = "default_card_max")]
  pub max: usize,
}

impl Default for CardLength {
  fn default() -> Self {
    Self { min: default_card_min(), max: default_card_max() }
  }
}

/// Everything a run reads from configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,

  /// Recorded as the actor on every field-change entry.
  #[serde(default = "default_actor")]
  pub actor: String,

  /// Store writes in flight at once during an import pass.
  #[serde(default = "default_chunk_size")]
  pub chunk_size: usize,

  #[serde(default = "default_feed_encoding")]
  pub feed_encoding: String,

  #[serde(default)]
  pub card_length: CardLength,

  #[serde(default)]
  pub sheets: SheetProfiles,

  /// Manual department aliases: raw name → department id. Consulted before
  /// any matching tier, for names known to be ambiguous.
  #[serde(default)]
  pub department_overrides: HashMap<String, String>,
}

impl Default for Profile {
  fn default() -> Self {
    Self {
      store_path:           default_store_path(),
      actor:                default_actor(),
      chunk_size:           default_chunk_size(),
      feed_encoding:        default_feed_encoding(),
      card_length:          CardLength::default(),
      sheets:               SheetProfiles::default(),
      department_overrides: HashMap::new(),
    }
  }
}
