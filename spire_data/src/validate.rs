use std::collections::HashSet;
use std::fmt;

use crate::*;

/// Structural problem in story content. Content carrying any of these must not
/// reach the runtime evaluators.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    DuplicateSceneId { id: String },
    EmptySceneId { context: String },
    EmptyChapterId,
    BadSceneIdPrefix { id: String },
    EmptyText { context: String },
    EmptyChoiceText { context: String },
    RateOutOfRange { context: String, value: f64 },
    InvalidRange { context: String },
    EmptyMembershipCheck { context: String },
    EmptyTarget { context: String },
    BadSceneIdReference { context: String, id: String },
    NonFiniteModifier { context: String, key: String },
    ZeroItemDelta { context: String, id: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateSceneId { id } => write!(f, "duplicate scene id '{id}'"),
            ValidationError::EmptySceneId { context } => write!(f, "empty scene id ({context})"),
            ValidationError::EmptyChapterId => write!(f, "chapter with empty id"),
            ValidationError::BadSceneIdPrefix { id } => {
                write!(f, "scene id '{id}' missing required '{SCENE_ID_PREFIX}' prefix")
            },
            ValidationError::EmptyText { context } => write!(f, "empty text ({context})"),
            ValidationError::EmptyChoiceText { context } => write!(f, "empty choice text ({context})"),
            ValidationError::RateOutOfRange { context, value } => {
                write!(f, "probability {value} outside [0,1] ({context})")
            },
            ValidationError::InvalidRange { context } => write!(f, "range min exceeds max ({context})"),
            ValidationError::EmptyMembershipCheck { context } => {
                write!(f, "membership check lists no keys ({context})")
            },
            ValidationError::EmptyTarget { context } => {
                write!(f, "move target names neither chapter nor scene ({context})")
            },
            ValidationError::BadSceneIdReference { context, id } => {
                write!(f, "referenced scene id '{id}' missing '{SCENE_ID_PREFIX}' prefix ({context})")
            },
            ValidationError::NonFiniteModifier { context, key } => {
                write!(f, "non-finite modifier for '{key}' ({context})")
            },
            ValidationError::ZeroItemDelta { context, id } => {
                write!(f, "item effect for '{id}' has zero delta ({context})")
            },
        }
    }
}

impl std::error::Error for ValidationError {}

/// Referentially dangling but structurally sound content: the id is a valid
/// key shape, but no game-data definition exists for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub kind: &'static str,
    pub id: String,
    pub context: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}' ({})", self.kind, self.id, self.context)
    }
}

/// Outcome of validating one piece of content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validate a single scene: id shape, text, conditions, choices, effects.
pub fn validate_scene(scene: &Scene, data: Option<&GameData>) -> ValidationReport {
    let mut report = ValidationReport::default();
    let context = if scene.id.trim().is_empty() {
        report.errors.push(ValidationError::EmptySceneId {
            context: "scene with empty id".to_string(),
        });
        "scene '<unnamed>'".to_string()
    } else {
        if !scene.id.starts_with(SCENE_ID_PREFIX) {
            report.errors.push(ValidationError::BadSceneIdPrefix { id: scene.id.clone() });
        }
        format!("scene '{}'", scene.id)
    };

    if scene.text.trim().is_empty() {
        report.errors.push(ValidationError::EmptyText { context: context.clone() });
    }
    for (idx, variant) in scene.conditional_text.iter().enumerate() {
        let vctx = format!("{context} conditional_text[{idx}]");
        if variant.text.trim().is_empty() {
            report.errors.push(ValidationError::EmptyText { context: vctx.clone() });
        }
        check_condition(&variant.condition, data, &vctx, &mut report);
    }
    if let Some(cond) = &scene.condition {
        check_condition(cond, data, &context, &mut report);
    }
    if let Some(cond) = &scene.priority_condition {
        check_condition(cond, data, &format!("{context} priority"), &mut report);
    }
    for (idx, choice) in scene.choices.iter().enumerate() {
        report.merge(validate_choice_in(choice, data, &format!("{context} choice[{idx}]")));
    }
    if let Some(effects) = &scene.effects {
        report.merge(validate_effects_in(effects, data, &context));
    }
    report
}

/// Validate an ordered scene list, including duplicate-id detection.
pub fn validate_scenes(scenes: &[Scene], data: Option<&GameData>) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut seen = HashSet::new();
    for scene in scenes {
        if !scene.id.trim().is_empty() && !seen.insert(scene.id.clone()) {
            report.errors.push(ValidationError::DuplicateSceneId { id: scene.id.clone() });
        }
        report.merge(validate_scene(scene, data));
    }
    report
}

/// Validate a chapter and every scene it carries.
pub fn validate_chapter(chapter: &Chapter, data: Option<&GameData>) -> ValidationReport {
    let mut report = ValidationReport::default();
    if chapter.id.trim().is_empty() {
        report.errors.push(ValidationError::EmptyChapterId);
    }
    report.merge(validate_scenes(&chapter.scenes, data));
    report
}

/// Validate a standalone condition tree.
pub fn validate_condition(condition: &Condition, data: Option<&GameData>) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_condition(condition, data, "condition", &mut report);
    report
}

/// Validate a standalone choice.
pub fn validate_choice(choice: &Choice, data: Option<&GameData>) -> ValidationReport {
    validate_choice_in(choice, data, "choice")
}

/// Validate a declarative effects block.
pub fn validate_effects(effects: &SceneEffects, data: Option<&GameData>) -> ValidationReport {
    validate_effects_in(effects, data, "effects")
}

fn validate_choice_in(choice: &Choice, data: Option<&GameData>, context: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    if choice.text.trim().is_empty() {
        report.errors.push(ValidationError::EmptyChoiceText {
            context: context.to_string(),
        });
    }
    if let Some(cond) = &choice.condition {
        check_condition(cond, data, context, &mut report);
    }
    if let Some(prob) = &choice.probability {
        check_rate(prob.base_rate, &format!("{context} base_rate"), &mut report);
        if let Some(max_rate) = prob.max_rate {
            check_rate(max_rate, &format!("{context} max_rate"), &mut report);
            if max_rate < prob.base_rate {
                report.errors.push(ValidationError::InvalidRange {
                    context: format!("{context} max_rate below base_rate"),
                });
            }
        }
        if let Some(modifiers) = &prob.modifier {
            check_modifiers(modifiers, data, context, &mut report);
        }
        check_target(&prob.success_next, &format!("{context} success_next"), &mut report);
        check_target(&prob.failure_next, &format!("{context} failure_next"), &mut report);
    }
    if let Some(next) = &choice.next {
        // An empty `next` is allowed: it requests random selection within the
        // current chapter. Only the id shape is checked here.
        if let Some(scene_id) = &next.scene_id
            && !scene_id.starts_with(SCENE_ID_PREFIX)
        {
            report.errors.push(ValidationError::BadSceneIdReference {
                context: context.to_string(),
                id: scene_id.clone(),
            });
        }
    }
    report
}

fn check_target(target: &NextTarget, context: &str, report: &mut ValidationReport) {
    if target.is_empty() {
        report.errors.push(ValidationError::EmptyTarget {
            context: context.to_string(),
        });
    }
    if let Some(scene_id) = &target.scene_id
        && !scene_id.starts_with(SCENE_ID_PREFIX)
    {
        report.errors.push(ValidationError::BadSceneIdReference {
            context: context.to_string(),
            id: scene_id.clone(),
        });
    }
}

fn check_rate(value: f64, context: &str, report: &mut ValidationReport) {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        report.errors.push(ValidationError::RateOutOfRange {
            context: context.to_string(),
            value,
        });
    }
}

fn check_condition(condition: &Condition, data: Option<&GameData>, context: &str, report: &mut ValidationReport) {
    match condition {
        Condition::All { all } => {
            for kid in all {
                check_condition(kid, data, context, report);
            }
        },
        Condition::Any { any } => {
            for kid in any {
                check_condition(kid, data, context, report);
            }
        },
        Condition::Atom(atom) => check_atom(atom, data, context, report),
    }
}

fn check_atom(atom: &AtomCondition, data: Option<&GameData>, context: &str, report: &mut ValidationReport) {
    if let Some(stats) = &atom.stats {
        for (key, check) in stats {
            check_num(*check, &format!("{context} stat '{key}'"), report);
            warn_unknown(data.map(|d| &d.stats), "stat", key, context, report);
        }
    }
    if let Some(variables) = &atom.variables {
        // Author-defined counters have no registry; only shape is checked.
        for (key, check) in variables {
            check_num(*check, &format!("{context} variable '{key}'"), report);
        }
    }
    if let Some(buffs) = &atom.buffs {
        check_set(buffs, data.map(|d| &d.buffs), "buff", context, report);
    }
    if let Some(flags) = &atom.flags {
        check_set(flags, data.map(|d| &d.flags), "flag", context, report);
    }
    if let Some(items) = &atom.items {
        for (id, check) in items {
            if let ItemCheck::Range {
                min: Some(min),
                max: Some(max),
            } = check
                && min > max
            {
                report.errors.push(ValidationError::InvalidRange {
                    context: format!("{context} item '{id}'"),
                });
            }
            warn_unknown(data.map(|d| &d.items), "item", id, context, report);
        }
    }
}

fn check_num(check: NumCheck, context: &str, report: &mut ValidationReport) {
    if let NumCheck::Range {
        min: Some(min),
        max: Some(max),
    } = check
        && min > max
    {
        report.errors.push(ValidationError::InvalidRange {
            context: context.to_string(),
        });
    }
}

fn check_set(
    check: &SetCheck,
    known: Option<&std::collections::BTreeSet<Id>>,
    kind: &'static str,
    context: &str,
    report: &mut ValidationReport,
) {
    if check.is_empty() {
        report.errors.push(ValidationError::EmptyMembershipCheck {
            context: format!("{context} {kind}s"),
        });
    }
    for id in check.includes.iter().chain(&check.not_in) {
        warn_unknown(known, kind, id, context, report);
    }
}

fn check_modifiers(
    modifiers: &ProbabilityModifiers,
    data: Option<&GameData>,
    context: &str,
    report: &mut ValidationReport,
) {
    check_modifier_map(&modifiers.stats, data.map(|d| &d.stats), "stat", context, report);
    check_modifier_map(&modifiers.buffs, data.map(|d| &d.buffs), "buff", context, report);
    check_modifier_map(&modifiers.flags, data.map(|d| &d.flags), "flag", context, report);
    check_modifier_map(&modifiers.items, data.map(|d| &d.items), "item", context, report);
    check_modifier_map(&modifiers.variables, None, "variable", context, report);
    check_modifier_map(&modifiers.skills, data.map(|d| &d.skills), "skill", context, report);
}

fn check_modifier_map(
    specs: &std::collections::BTreeMap<Id, ModifierSpec>,
    known: Option<&std::collections::BTreeSet<Id>>,
    kind: &'static str,
    context: &str,
    report: &mut ValidationReport,
) {
    for (key, spec) in specs {
        if !spec.per_unit.is_finite() || spec.max.is_some_and(|m| !m.is_finite()) {
            report.errors.push(ValidationError::NonFiniteModifier {
                context: context.to_string(),
                key: key.clone(),
            });
        }
        warn_unknown(known, kind, key, context, report);
    }
}

fn validate_effects_in(effects: &SceneEffects, data: Option<&GameData>, context: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    for id in effects.add_buffs.iter().chain(&effects.remove_buffs) {
        warn_unknown(data.map(|d| &d.buffs), "buff", id, context, &mut report);
    }
    for id in effects.set_flags.iter().chain(&effects.unset_flags) {
        warn_unknown(data.map(|d| &d.flags), "flag", id, context, &mut report);
    }
    for delta in &effects.items {
        if delta.delta == 0 {
            report.errors.push(ValidationError::ZeroItemDelta {
                context: context.to_string(),
                id: delta.id.clone(),
            });
        }
        warn_unknown(data.map(|d| &d.items), "item", &delta.id, context, &mut report);
    }
    report
}

fn warn_unknown(
    known: Option<&std::collections::BTreeSet<Id>>,
    kind: &'static str,
    id: &str,
    context: &str,
    report: &mut ValidationReport,
) {
    if let Some(set) = known
        && !set.contains(id)
    {
        report.warnings.push(ValidationWarning {
            kind,
            id: id.to_string(),
            context: context.to_string(),
        });
    }
}
