//! Built-in actions and conditions registered by
//! [`ActionRegistry::with_builtins`](crate::ActionRegistry::with_builtins).

use trellis_foundation::{Error, NodeId, QName, Result, Value};
use trellis_storage::{AssocType, aspects, props};

use crate::action::{ActionHandler, ConditionEvaluator, Parameters};
use crate::context::RuleTransaction;

/// Applies the aspect named by [`ASPECT_NAME`].
pub const ADD_FEATURES: &str = "add-features";
/// Removes the aspect named by [`ASPECT_NAME`].
pub const REMOVE_FEATURES: &str = "remove-features";
/// Sets [`PROPERTY`] to [`VALUE`].
pub const SET_PROPERTY: &str = "set-property";
/// Copies the node into [`DESTINATION_FOLDER`].
pub const COPY: &str = "copy";
/// Always holds.
pub const NO_CONDITION: &str = "no-condition";
/// Holds when the node has the aspect named by [`ASPECT`].
pub const HAS_ASPECT: &str = "has-aspect";

/// Parameter: aspect to add or remove.
pub const ASPECT_NAME: &str = "aspect-name";
/// Parameter: property to set.
pub const PROPERTY: &str = "property";
/// Parameter: value to set.
pub const VALUE: &str = "value";
/// Parameter: copy destination.
pub const DESTINATION_FOLDER: &str = "destination-folder";
/// Parameter: aspect to test for.
pub const ASPECT: &str = "aspect";

fn name_param(action: &str, parameters: &Parameters, key: &str) -> Result<QName> {
    parameters
        .get(key)
        .and_then(Value::as_name)
        .ok_or_else(|| Error::action_failed(action, format!("missing parameter {key}")))
}

fn node_param(action: &str, parameters: &Parameters, key: &str) -> Result<NodeId> {
    parameters
        .get(key)
        .and_then(Value::as_node)
        .ok_or_else(|| Error::action_failed(action, format!("missing parameter {key}")))
}

// =============================================================================
// Actions
// =============================================================================

/// See [`ADD_FEATURES`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AddFeatures;

impl ActionHandler for AddFeatures {
    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<()> {
        let aspect = name_param(ADD_FEATURES, parameters, ASPECT_NAME)?;
        txn.add_aspect(target, aspect)?;
        Ok(())
    }
}

/// See [`REMOVE_FEATURES`].
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveFeatures;

impl ActionHandler for RemoveFeatures {
    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<()> {
        let aspect = name_param(REMOVE_FEATURES, parameters, ASPECT_NAME)?;
        txn.remove_aspect(target, &aspect)?;
        Ok(())
    }
}

/// See [`SET_PROPERTY`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SetProperty;

impl ActionHandler for SetProperty {
    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<()> {
        let property = name_param(SET_PROPERTY, parameters, PROPERTY)?;
        let value = parameters
            .get(VALUE)
            .cloned()
            .ok_or_else(|| Error::action_failed(SET_PROPERTY, "missing parameter value"))?;
        txn.set_property(target, property, value)
    }
}

/// See [`COPY`].
///
/// The copy keeps the source's type, name, properties, and aspects, and is
/// marked `cm:copiedfrom` with `cm:original` pointing back at the source.
/// Rule metadata is not copied.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyTo;

impl ActionHandler for CopyTo {
    fn execute(
        &self,
        txn: &mut RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<()> {
        let destination = node_param(COPY, parameters, DESTINATION_FOLDER)?;
        let source = txn.store().node(target)?.clone();
        if source.node_type.is_rule_metadata() {
            return Err(Error::action_failed(COPY, "cannot copy rule metadata"));
        }

        let copy = txn.create_node(destination, AssocType::Contains, &source.name, source.node_type)?;

        let mut properties: Vec<(QName, Value)> = source
            .properties
            .iter()
            .filter(|(name, _)| **name != props::ORIGINAL)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        properties.push((props::ORIGINAL, Value::Node(target)));
        txn.set_properties(copy, properties)?;

        for aspect in &source.aspects {
            if *aspect != aspects::RULES && *aspect != aspects::COPIED_FROM {
                txn.add_aspect(copy, aspect.clone())?;
            }
        }
        txn.add_aspect(copy, aspects::COPIED_FROM)?;
        Ok(())
    }
}

// =============================================================================
// Conditions
// =============================================================================

/// See [`NO_CONDITION`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCondition;

impl ConditionEvaluator for NoCondition {
    fn evaluate(&self, _: &RuleTransaction<'_>, _: &Parameters, _: NodeId) -> Result<bool> {
        Ok(true)
    }
}

/// See [`HAS_ASPECT`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HasAspect;

impl ConditionEvaluator for HasAspect {
    fn evaluate(
        &self,
        txn: &RuleTransaction<'_>,
        parameters: &Parameters,
        target: NodeId,
    ) -> Result<bool> {
        let aspect = parameters
            .get(ASPECT)
            .and_then(Value::as_name)
            .ok_or_else(|| Error::validation("has-aspect requires an aspect parameter"))?;
        Ok(txn.store().has_aspect(target, &aspect))
    }
}
