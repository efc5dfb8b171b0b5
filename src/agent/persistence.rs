//! JSON encoding of the value table.
//!
//! Keys are written as `chaser_row,chaser_col,runner_row,runner_col` and read
//! back with a strict four-integer parser. Each row is an object holding
//! exactly the five action values.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::agent::qtable::{ActionValues, StateKey, ValueTable};
use crate::error::{Error, Result};
use crate::grid::{Action, Grid, Position};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct BrainDocument {
    version: u32,
    grid_size: i32,
    entries: BTreeMap<String, ActionRow>
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "UPPERCASE")]
struct ActionRow {
    up: f64,
    down: f64,
    left: f64,
    right: f64,
    stay: f64
}

impl From<&ActionValues> for ActionRow {
    fn from(values: &ActionValues) -> Self {
        Self {
            up: values.get(Action::Up),
            down: values.get(Action::Down),
            left: values.get(Action::Left),
            right: values.get(Action::Right),
            stay: values.get(Action::Stay)
        }
    }
}

impl From<&ActionRow> for ActionValues {
    fn from(row: &ActionRow) -> Self {
        ActionValues::from_array([row.up, row.down, row.left, row.right, row.stay])
    }
}

pub fn encode_key(key: &StateKey) -> String {
    format!("{},{},{},{}", key.chaser.row, key.chaser.col, key.runner.row, key.runner.col)
}

pub fn decode_key(text: &str, grid: &Grid) -> std::result::Result<StateKey, String> {
    let parts: Vec<&str> = text.split(',').collect();
    if parts.len() != 4 {
        return Err(format!("key '{}' must have 4 comma-separated fields, found {}", text, parts.len()));
    }

    let mut numbers = [0i32; 4];
    for (slot, part) in numbers.iter_mut().zip(&parts) {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("key '{}' has non-numeric field '{}'", text, part));
        }
        *slot = part
            .parse()
            .map_err(|e| format!("key '{}' field '{}': {}", text, part, e))?;
    }

    let chaser = Position::new(numbers[0], numbers[1]);
    let runner = Position::new(numbers[2], numbers[3]);
    if !grid.contains(chaser) || !grid.contains(runner) {
        return Err(format!("key '{}' lies outside the {}x{} grid", text, grid.size(), grid.size()));
    }

    Ok(StateKey::new(chaser, runner))
}

pub fn to_json(table: &ValueTable, grid: &Grid) -> Result<String> {
    Ok(serde_json::to_string(&document(table, grid))?)
}

/// Parses a saved brain. `origin` is only used in error messages.
pub fn from_json(text: &str, grid: &Grid, origin: &Path) -> Result<ValueTable> {
    let document: BrainDocument = serde_json::from_str(text)
        .map_err(|e| Error::corrupt(origin, e.to_string()))?;

    if document.version != FORMAT_VERSION {
        return Err(Error::corrupt(
            origin,
            format!("unsupported format version {} (expected {})", document.version, FORMAT_VERSION),
        ));
    }
    if document.grid_size != grid.size() {
        return Err(Error::corrupt(
            origin,
            format!("brain was trained on a {0}x{0} grid, not {1}x{1}", document.grid_size, grid.size()),
        ));
    }
    // an empty table would look trained while knowing nothing
    if document.entries.is_empty() {
        return Err(Error::corrupt(origin, "no entries"));
    }

    let mut table = ValueTable::new();
    for (text_key, row) in &document.entries {
        let key = decode_key(text_key, grid).map_err(|reason| Error::corrupt(origin, reason))?;
        table.insert_row(key, ActionValues::from(row));
    }

    Ok(table)
}

pub fn save(table: &ValueTable, grid: &Grid, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|source| Error::Io {
        operation: format!("create {}", path.display()),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &document(table, grid))?;
    writer.flush()?;

    log::info!("stored {} states to {}", table.len(), path.display());
    Ok(())
}

pub fn load(grid: &Grid, path: &Path) -> Result<ValueTable> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::BrainNotFound { path: path.to_path_buf() });
        }
        Err(source) => {
            return Err(Error::Io {
                operation: format!("open {}", path.display()),
                source,
            });
        }
    };

    let mut text = String::new();
    BufReader::new(file)
        .read_to_string(&mut text)
        .map_err(|e| Error::corrupt(path, e.to_string()))?;

    let table = from_json(&text, grid, path)?;
    log::info!("loaded {} states from {}", table.len(), path.display());
    Ok(table)
}

fn document(table: &ValueTable, grid: &Grid) -> BrainDocument {
    BrainDocument {
        version: FORMAT_VERSION,
        grid_size: grid.size(),
        entries: table
            .iter()
            .map(|(key, values)| (encode_key(key), ActionRow::from(values)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(cr: i32, cc: i32, rr: i32, rc: i32) -> StateKey {
        StateKey::new(Position::new(cr, cc), Position::new(rr, rc))
    }

    fn sample_table() -> ValueTable {
        let mut table = ValueTable::new();
        table.insert_row(key(6, 6, 0, 0), ActionValues::from_array([-1.5, 0.0, 0.1 + 0.2, 0.0, 173.0417352]));
        table.insert_row(key(5, 6, 6, 5), ActionValues::from_array([0.0, 199.99999999, -200.0, 0.0, -0.000123]));
        table.insert_row(key(0, 0, 3, 4), ActionValues::default());
        table
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pursuit_{}_{}.json", name, std::process::id()))
    }

    #[test]
    fn test_key_encoding() {
        let grid = Grid::default();
        assert_eq!(encode_key(&key(6, 6, 0, 1)), "6,6,0,1");
        assert_eq!(decode_key("6,6,0,1", &grid), Ok(key(6, 6, 0, 1)));
    }

    #[test]
    fn test_decode_key_is_strict() {
        let grid = Grid::default();
        for bad in ["", "1,2,3", "1,2,3,4,5", "1, 2,3,4", "a,b,c,d", "-1,0,0,0", "1,2,3,", "7,0,0,0", "0,0,0,99999999999", "((6, 6), (0, 0))"] {
            assert!(decode_key(bad, &grid).is_err(), "accepted '{}'", bad);
        }
    }

    #[test]
    fn test_json_round_trip_is_exact() {
        let grid = Grid::default();
        let table = sample_table();

        let text = to_json(&table, &grid).unwrap();
        let restored = from_json(&text, &grid, Path::new("memory")).unwrap();

        assert_eq!(restored, table);
    }

    #[test]
    fn test_document_shape() {
        let grid = Grid::default();
        let mut table = ValueTable::new();
        table.set(key(6, 6, 0, 0), Action::Stay, 2.5);

        let text = to_json(&table, &grid).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["version"], 1);
        assert_eq!(value["grid_size"], 7);
        assert_eq!(value["entries"]["6,6,0,0"]["STAY"], 2.5);
        assert_eq!(value["entries"]["6,6,0,0"]["UP"], 0.0);
    }

    #[test]
    fn test_corrupt_documents_are_rejected() {
        let grid = Grid::default();
        let row = r#"{"UP":0,"DOWN":0,"LEFT":0,"RIGHT":0,"STAY":0}"#;
        let cases = [
            "not json".to_string(),
            format!(r#"{{"version":2,"grid_size":7,"entries":{{"6,6,0,0":{}}}}}"#, row),
            format!(r#"{{"version":1,"grid_size":5,"entries":{{"4,4,0,0":{}}}}}"#, row),
            r#"{"version":1,"grid_size":7,"entries":{}}"#.to_string(),
            format!(r#"{{"version":1,"grid_size":7,"entries":{{"(6, 6)":{}}}}}"#, row),
            r#"{"version":1,"grid_size":7,"entries":{"6,6,0,0":{"UP":0,"DOWN":0,"LEFT":0,"RIGHT":0}}}"#.to_string(),
            r#"{"version":1,"grid_size":7,"entries":{"6,6,0,0":{"UP":0,"DOWN":0,"LEFT":0,"RIGHT":0,"STAY":0,"JUMP":1}}}"#.to_string(),
            r#"{"version":1,"grid_size":7,"entries":{"6,6,0,0":{"UP":"x","DOWN":0,"LEFT":0,"RIGHT":0,"STAY":0}}}"#.to_string(),
        ];

        for case in &cases {
            match from_json(case, &grid, Path::new("test")) {
                Err(Error::CorruptBrain { .. }) => {}
                other => panic!("expected corrupt brain for {}, got {:?}", case, other),
            }
        }
    }

    #[test]
    fn test_save_and_load_file() {
        let grid = Grid::default();
        let table = sample_table();
        let path = temp_path("roundtrip");

        save(&table, &grid, &path).unwrap();
        let loaded = load(&grid, &path).unwrap();
        assert_eq!(loaded, table);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let grid = Grid::default();
        let path = temp_path("does_not_exist");

        let err = load(&grid, &path).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_garbage_file_is_corrupt_not_missing() {
        let grid = Grid::default();
        let path = temp_path("garbage");
        std::fs::write(&path, "{ this is not a brain").unwrap();

        let err = load(&grid, &path).unwrap_err();
        assert!(!err.is_not_found());
        assert!(matches!(err, Error::CorruptBrain { .. }));

        std::fs::remove_file(&path).unwrap();
    }
}
