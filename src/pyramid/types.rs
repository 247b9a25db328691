//! Core data types for the timeframe pyramid

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{DashboardError, DashboardResult};

/// Timeframe of a pyramid block, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    D1,
    H4,
    H1,
    M15,
    M5,
    M1,
}

impl Timeframe {
    /// All timeframes, coarsest first
    pub const ALL: [Timeframe; 6] = [
        Timeframe::D1,
        Timeframe::H4,
        Timeframe::H1,
        Timeframe::M15,
        Timeframe::M5,
        Timeframe::M1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::D1 => "D1",
            Timeframe::H4 => "H4",
            Timeframe::H1 => "H1",
            Timeframe::M15 => "M15",
            Timeframe::M5 => "M5",
            Timeframe::M1 => "M1",
        }
    }

    /// Position in [`Timeframe::ALL`]
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Number of next-finer blocks a block of this timeframe is made of
    ///
    /// `M1` is the finest timeframe and has no fixed child count.
    pub fn expected_children(&self) -> Option<usize> {
        match self {
            Timeframe::D1 => Some(6),
            Timeframe::H4 => Some(4),
            Timeframe::H1 => Some(4),
            Timeframe::M15 => Some(3),
            Timeframe::M5 => Some(5),
            Timeframe::M1 => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::ALL
            .into_iter()
            .find(|tf| tf.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| DashboardError::Parse(format!("unknown timeframe '{}'", s)))
    }
}

/// Directional tag of a block
///
/// The backend has historically sent colored markers instead of words, so both
/// spellings are accepted. Anything unrecognised is treated as neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Direction {
    Up,
    Down,
    #[default]
    Neutral,
}

impl From<String> for Direction {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "up" | "bull" | "bullish" | "🟢" => Direction::Up,
            "down" | "bear" | "bearish" | "🔴" => Direction::Down,
            _ => Direction::Neutral,
        }
    }
}

/// Period start of a block, either a unix timestamp or a backend label
///
/// Fractional timestamps are truncated to whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum BlockTime {
    Unix(i64),
    Label(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBlockTime {
    Int(i64),
    Float(f64),
    Label(String),
}

impl<'de> Deserialize<'de> for BlockTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawBlockTime::deserialize(deserializer)? {
            RawBlockTime::Int(ts) => BlockTime::Unix(ts),
            RawBlockTime::Float(ts) => BlockTime::Unix(ts.trunc() as i64),
            RawBlockTime::Label(label) => BlockTime::Label(label),
        })
    }
}

impl fmt::Display for BlockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTime::Unix(ts) => write!(f, "{}", ts),
            BlockTime::Label(label) => f.write_str(label),
        }
    }
}

impl From<i64> for BlockTime {
    fn from(ts: i64) -> Self {
        BlockTime::Unix(ts)
    }
}

impl From<&str> for BlockTime {
    fn from(label: &str) -> Self {
        BlockTime::Label(label.to_string())
    }
}

/// Stable identity of a block: `<tf>_<time>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(tf: Timeframe, time: &BlockTime) -> Self {
        Self(format!("{}_{}", tf, time))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.trim().to_string())
    }
}

/// A node of the timeframe pyramid as received from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub tf: Timeframe,
    pub time: BlockTime,
    #[serde(default)]
    pub dir: Direction,
    #[serde(rename = "O", default, deserialize_with = "de_opt_number", skip_serializing_if = "Option::is_none")]
    pub open: Option<f64>,
    #[serde(rename = "H", default, deserialize_with = "de_opt_number", skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(rename = "L", default, deserialize_with = "de_opt_number", skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(rename = "C", default, deserialize_with = "de_opt_number", skip_serializing_if = "Option::is_none")]
    pub close: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number", skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    /// Backend-provided range label shown next to the timeframe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    /// Present once the backend has finished computing momentum for the block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub momentum_summary: Option<String>,
    #[serde(default, deserialize_with = "de_children", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
}

impl Block {
    /// Create an empty block; the remaining fields are filled with the `with_*` builders
    pub fn new(tf: Timeframe, time: impl Into<BlockTime>) -> Self {
        Self {
            tf,
            time: time.into(),
            dir: Direction::Neutral,
            open: None,
            high: None,
            low: None,
            close: None,
            volume: None,
            range: None,
            momentum_summary: None,
            children: Vec::new(),
        }
    }

    pub fn with_ohlc(mut self, open: f64, high: f64, low: f64, close: f64) -> Self {
        self.open = Some(open);
        self.high = Some(high);
        self.low = Some(low);
        self.close = Some(close);
        self
    }

    pub fn with_direction(mut self, dir: Direction) -> Self {
        self.dir = dir;
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_momentum(mut self, summary: impl Into<String>) -> Self {
        self.momentum_summary = Some(summary.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    pub fn id(&self) -> BlockId {
        BlockId::new(self.tf, &self.time)
    }

    /// A non-empty momentum summary marks the block as finished
    pub fn has_momentum(&self) -> bool {
        self.momentum_summary
            .as_deref()
            .is_some_and(|s| !s.is_empty())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Root list of blocks returned by one dashboard fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockTreeSnapshot {
    pub blocks: Vec<Block>,
}

impl BlockTreeSnapshot {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Parse a `/api/pyramid` response body
    ///
    /// A body carrying an `error` field, or lacking `blocks`, is malformed.
    pub fn from_json(body: &str) -> DashboardResult<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;

        if let Some(err) = value.get("error").filter(|e| !e.is_null()) {
            return Err(DashboardError::MalformedData(format!(
                "backend reported error: {}",
                err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string())
            )));
        }

        match value.get("blocks") {
            Some(serde_json::Value::Null) | None => Err(DashboardError::MalformedData(
                "response has no blocks".into(),
            )),
            Some(blocks) => {
                let blocks: Vec<Block> = serde_json::from_value(blocks.clone())?;
                Ok(Self { blocks })
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Depth-first search for a block by id
    pub fn find(&self, id: &BlockId) -> Option<&Block> {
        fn walk<'a>(blocks: &'a [Block], id: &BlockId) -> Option<&'a Block> {
            for block in blocks {
                if block.id() == *id {
                    return Some(block);
                }
                if let Some(found) = walk(&block.children, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&self.blocks, id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Prices arrive either as JSON numbers or as numeric strings
fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<NumberOrText> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(NumberOrText::Number(v)) => Some(v),
        Some(NumberOrText::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

fn de_children<'de, D>(deserializer: D) -> Result<Vec<Block>, D::Error>
where
    D: Deserializer<'de>,
{
    let children: Option<Vec<Block>> = Option::deserialize(deserializer)?;
    Ok(children.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_format() {
        let block = Block::new(Timeframe::H1, 172000);
        assert_eq!(block.id().as_str(), "H1_172000");

        let block = Block::new(Timeframe::M15, "2024-01-02 10:15");
        assert_eq!(block.id().to_string(), "M15_2024-01-02 10:15");
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("m15".parse::<Timeframe>().unwrap(), Timeframe::M15);
        assert_eq!(" D1 ".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert!("W1".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_expected_children_table() {
        assert_eq!(Timeframe::D1.expected_children(), Some(6));
        assert_eq!(Timeframe::H4.expected_children(), Some(4));
        assert_eq!(Timeframe::H1.expected_children(), Some(4));
        assert_eq!(Timeframe::M15.expected_children(), Some(3));
        assert_eq!(Timeframe::M5.expected_children(), Some(5));
        assert_eq!(Timeframe::M1.expected_children(), None);
    }

    #[test]
    fn test_direction_markers() {
        assert_eq!(Direction::from("🟢".to_string()), Direction::Up);
        assert_eq!(Direction::from("down".to_string()), Direction::Down);
        assert_eq!(Direction::from("⚪".to_string()), Direction::Neutral);
    }

    #[test]
    fn test_has_momentum_ignores_empty_summary() {
        assert!(!Block::new(Timeframe::M5, 1).has_momentum());
        assert!(!Block::new(Timeframe::M5, 1).with_momentum("").has_momentum());
        assert!(Block::new(Timeframe::M5, 1).with_momentum("neutral").has_momentum());
    }

    #[test]
    fn test_snapshot_from_json() {
        let body = r#"{
            "blocks": [{
                "tf": "H4", "time": 1700000000, "dir": "🟢",
                "O": "1.1000", "H": 1.1050, "L": 1.0990, "C": 1.1040,
                "volume": null,
                "momentum_summary": "strong up",
                "children": [
                    {"tf": "H1", "time": 1700000000, "children": null}
                ]
            }]
        }"#;
        let snapshot = BlockTreeSnapshot::from_json(body).unwrap();
        let block = &snapshot.blocks[0];

        assert_eq!(block.tf, Timeframe::H4);
        assert_eq!(block.dir, Direction::Up);
        assert_eq!(block.open, Some(1.1));
        assert_eq!(block.high, Some(1.105));
        assert_eq!(block.volume, None);
        assert_eq!(block.children.len(), 1);
        assert!(block.children[0].is_leaf());
    }

    #[test]
    fn test_float_time_truncates_to_seconds() {
        let body = r#"{"blocks": [
            {"tf": "H1", "time": 1700000000.0},
            {"tf": "H1", "time": 1700003600.75},
            {"tf": "H1", "time": "Mon 14:00"}
        ]}"#;
        let snapshot = BlockTreeSnapshot::from_json(body).unwrap();

        assert_eq!(snapshot.blocks[0].time, BlockTime::Unix(1700000000));
        assert_eq!(snapshot.blocks[1].time, BlockTime::Unix(1700003600));
        assert_eq!(snapshot.blocks[1].id().as_str(), "H1_1700003600");
        assert_eq!(snapshot.blocks[2].time, BlockTime::from("Mon 14:00"));
    }

    #[test]
    fn test_snapshot_without_blocks_is_malformed() {
        let err = BlockTreeSnapshot::from_json(r#"{"pair": "EURUSD"}"#).unwrap_err();
        assert!(matches!(err, DashboardError::MalformedData(_)));

        let err = BlockTreeSnapshot::from_json(r#"{"error": "no data yet"}"#).unwrap_err();
        assert_eq!(
            err,
            DashboardError::MalformedData("backend reported error: no data yet".into())
        );
    }

    #[test]
    fn test_snapshot_unknown_timeframe_is_malformed() {
        let err = BlockTreeSnapshot::from_json(r#"{"blocks": [{"tf": "W1", "time": 1}]}"#)
            .unwrap_err();
        assert!(matches!(err, DashboardError::MalformedData(_)));
    }

    #[test]
    fn test_find_nested_block() {
        let snapshot = BlockTreeSnapshot::new(vec![Block::new(Timeframe::H4, 1).with_children(
            vec![Block::new(Timeframe::H1, 1), Block::new(Timeframe::H1, 2)],
        )]);

        assert!(snapshot.find(&BlockId::from("H1_2")).is_some());
        assert!(snapshot.find(&BlockId::from("H1_3")).is_none());
    }
}
