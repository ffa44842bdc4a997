use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stable identifier used across story content references.
pub type Id = String;

/// Every scene id must carry this prefix; the validator enforces it.
pub const SCENE_ID_PREFIX: &str = "scene_";

/// A chapter: the unit of lazy loading. Scenes keep their authored order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Chapter {
    pub id: Id,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub floor: i64,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Declaring a successor enables read-ahead preloading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_chapter_id: Option<Id>,
}

/// An atomic narrative unit. Immutable once registered with the engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Scene {
    pub id: Id,
    pub text: String,
    /// First entry whose condition holds supplies the displayed text;
    /// none matching falls back to `text`.
    #[serde(default)]
    pub conditional_text: Vec<ConditionalText>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    /// Gates whether the scene is selectable at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub repeatable: bool,
    #[serde(default)]
    pub random_selectable: bool,
    /// Scenes satisfying this are selected ahead of every non-priority scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_condition: Option<Condition>,
    #[serde(default)]
    pub background_effects: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<SceneEffects>,
}

/// Conditional text variant for a scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionalText {
    pub condition: Condition,
    pub text: String,
}

/// A selectable branch offered by a scene.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Choice {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// When `Some(false)` and `condition` fails, the choice is hidden outright.
    /// Absent or `true` keeps it visible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_if_failed_condition: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<ProbabilitySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NextTarget>,
}

/// Direction for a move: either half may be omitted.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct NextTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<Id>,
}

impl NextTarget {
    pub fn is_empty(&self) -> bool {
        self.chapter_id.is_none() && self.scene_id.is_none()
    }
}

/// Probability-branched outcome attached to a choice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbabilitySpec {
    pub base_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<ProbabilityModifiers>,
    pub success_next: NextTarget,
    pub failure_next: NextTarget,
}

/// Per-category probability modifiers, keyed by stat/buff/flag/item/variable/skill id.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProbabilityModifiers {
    #[serde(default)]
    pub stats: BTreeMap<Id, ModifierSpec>,
    #[serde(default)]
    pub buffs: BTreeMap<Id, ModifierSpec>,
    #[serde(default)]
    pub flags: BTreeMap<Id, ModifierSpec>,
    #[serde(default)]
    pub items: BTreeMap<Id, ModifierSpec>,
    #[serde(default)]
    pub variables: BTreeMap<Id, ModifierSpec>,
    #[serde(default)]
    pub skills: BTreeMap<Id, ModifierSpec>,
}

impl ProbabilityModifiers {
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
            && self.buffs.is_empty()
            && self.flags.is_empty()
            && self.items.is_empty()
            && self.variables.is_empty()
            && self.skills.is_empty()
    }
}

/// Contribution of one keyed quantity: `quantity * per_unit`, capped at `max`
/// before accumulation onto the base rate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ModifierSpec {
    pub per_unit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// A recursive boolean expression over player state.
///
/// `$and` of an empty list is vacuously true; `$or` of an empty list is false.
/// An absent condition anywhere counts as "always available".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Condition {
    All {
        #[serde(rename = "$and")]
        all: Vec<Condition>,
    },
    Any {
        #[serde(rename = "$or")]
        any: Vec<Condition>,
    },
    Atom(AtomCondition),
}

/// Leaf condition: every present field must be satisfied (implicit AND).
///
/// Unknown fields are rejected at deserialization so that malformed leaves
/// surface as content errors rather than silently-empty atoms.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AtomCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<Id, NumCheck>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<Id, NumCheck>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffs: Option<SetCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<SetCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<BTreeMap<Id, ItemCheck>>,
}

/// Numeric comparison: an exact value or a `{min,max}` range (both optional).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum NumCheck {
    Exact(f64),
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
}

/// Item-quantity constraint: exact count or inclusive range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ItemCheck {
    Exact(i64),
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
}

/// Membership test against a set of string keys. Only `in` / `not_in` are
/// permitted operators; anything else fails deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SetCheck {
    #[serde(default, rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<Id>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_in: Vec<Id>,
}

impl SetCheck {
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.not_in.is_empty()
    }
}

/// Declarative state mutations attached to a scene. The engine constructs and
/// validates these; an external reducer executes them.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SceneEffects {
    #[serde(default)]
    pub add_buffs: Vec<Id>,
    #[serde(default)]
    pub remove_buffs: Vec<Id>,
    #[serde(default)]
    pub set_flags: Vec<Id>,
    #[serde(default)]
    pub unset_flags: Vec<Id>,
    #[serde(default)]
    pub items: Vec<ItemDelta>,
    #[serde(default)]
    pub experience: BTreeMap<Id, f64>,
}

impl SceneEffects {
    pub fn is_empty(&self) -> bool {
        self.add_buffs.is_empty()
            && self.remove_buffs.is_empty()
            && self.set_flags.is_empty()
            && self.unset_flags.is_empty()
            && self.items.is_empty()
            && self.experience.is_empty()
    }
}

/// Quantity delta for one item id. Negative removes, positive grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemDelta {
    pub id: Id,
    pub delta: i64,
}

/// Registry of the game-data definitions a story may reference. Validators use
/// it to warn about dangling ids; condition evaluation never consults it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GameData {
    #[serde(default)]
    pub stats: BTreeSet<Id>,
    #[serde(default)]
    pub buffs: BTreeSet<Id>,
    #[serde(default)]
    pub flags: BTreeSet<Id>,
    #[serde(default)]
    pub items: BTreeSet<Id>,
    #[serde(default)]
    pub skills: BTreeSet<Id>,
}
