// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Expression node tree
//!
//! Nodes are immutable once built and shared through `Arc`, so identical
//! sub-expressions can be represented by a single node. Every node caches
//! its compiled computation per [`CompileMode`].
//!
//! Composite nodes are only constructed through operators and functions that
//! accept their operand types. Construction unifies the operand types:
//! parameters whose type is still open are fixed to the first type the
//! operator accepts, trying the types of the other operands first, then the
//! operator's preferred order.

pub mod compiled;
mod constant;
mod function;
mod operator;
mod parameter;

pub use compiled::{CompileMode, CompiledCell, CompiledFn, EvaluationScope};
pub use constant::ConstantNode;
pub use function::{Arguments, FunctionNode};
pub use operator::{BinaryNode, TernaryNode, UnaryNode};
pub use parameter::ParameterNode;

use crate::model::{NumericKind, SupportedValueTypes, TypeInfo, Value, ValueType};
use crate::parameters::{OperandType, ParameterHandle, ParameterRegistry};
use crate::registry::function::{RandomSource, SpecialObject, SpecialObjectKind};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// A node of a compiled expression tree
#[derive(Debug)]
pub enum Node {
    /// Literal value
    Constant(ConstantNode),
    /// Reference to a parameter
    Parameter(ParameterNode),
    /// Prefix operator
    Unary(UnaryNode),
    /// Infix operator
    Binary(BinaryNode),
    /// Mixfix operator
    Ternary(TernaryNode),
    /// Function call
    Function(FunctionNode),
}

impl Node {
    /// A constant node
    pub fn constant(value: Value) -> Self {
        Node::Constant(ConstantNode::new(value))
    }

    /// The node's result type
    pub fn return_type(&self) -> TypeInfo {
        match self {
            Node::Constant(node) => node.return_type(),
            Node::Parameter(node) => node.return_type(),
            Node::Unary(node) => node.return_type(),
            Node::Binary(node) => node.return_type(),
            Node::Ternary(node) => node.return_type(),
            Node::Function(node) => node.return_type(),
        }
    }

    /// Type knowledge used while unifying; only parameters can be undetermined
    pub fn operand_type(&self) -> OperandType {
        match self {
            Node::Parameter(node) => node.operand_type(),
            other => OperandType::Known(other.return_type()),
        }
    }

    /// Whether this is a literal
    pub fn is_constant(&self) -> bool {
        matches!(self, Node::Constant(_))
    }

    /// Whether this node or a descendant honours a comparison tolerance
    pub fn is_tolerant(&self) -> bool {
        match self {
            Node::Constant(_) | Node::Parameter(_) => false,
            Node::Unary(node) => node.is_tolerant(),
            Node::Binary(node) => node.is_tolerant(),
            Node::Ternary(node) => node.is_tolerant(),
            Node::Function(node) => node.is_tolerant(),
        }
    }

    /// The literal value of a constant node
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            Node::Constant(node) => Some(node.value()),
            _ => None,
        }
    }

    /// The parameter handle of a parameter node
    pub fn parameter_handle(&self) -> Option<ParameterHandle> {
        match self {
            Node::Parameter(node) => Some(node.handle()),
            _ => None,
        }
    }

    /// Direct children, in operand order
    pub fn children(&self) -> SmallVec<[&Arc<Node>; 3]> {
        match self {
            Node::Constant(_) | Node::Parameter(_) => SmallVec::new(),
            Node::Unary(node) => SmallVec::from_iter([node.operand()]),
            Node::Binary(node) => SmallVec::from_iter([node.left(), node.right()]),
            Node::Ternary(node) => node.operands().iter().collect(),
            Node::Function(node) => node.arguments().iter().collect(),
        }
    }

    /// The computation for `mode`, built on first request and cached
    ///
    /// A node without tolerant descendants returns its exact computation for
    /// both modes.
    pub fn compile(&self, mode: CompileMode) -> CompiledFn {
        let mode = match mode {
            CompileMode::Tolerant if !self.is_tolerant() => CompileMode::Exact,
            mode => mode,
        };
        match self {
            Node::Constant(node) => node.compile(mode),
            Node::Parameter(node) => node.compile(mode),
            Node::Unary(node) => node.compile(mode),
            Node::Binary(node) => node.compile(mode),
            Node::Ternary(node) => node.compile(mode),
            Node::Function(node) => node.compile(mode),
        }
    }

    /// Fold the node into a constant when all of its operands are constant
    ///
    /// Folding evaluates through the node's own exact computation. When that
    /// evaluation fails the node is returned unchanged, so the error surfaces
    /// when the expression is evaluated.
    pub fn simplify(self: &Arc<Self>) -> Arc<Node> {
        let foldable = match self.as_ref() {
            Node::Constant(_) | Node::Parameter(_) => false,
            Node::Function(node) => node.is_foldable(),
            other => other.children().iter().all(|child| child.is_constant()),
        };
        if !foldable {
            return Arc::clone(self);
        }

        let computation = self.compile(CompileMode::Exact);
        match computation(&EvaluationScope::empty()) {
            Ok(value) => {
                log::trace!("Folded {self} to {value:?}");
                Arc::new(Node::constant(value))
            }
            Err(error) => {
                log::debug!("Not folding {self}: {error}");
                Arc::clone(self)
            }
        }
    }

    /// Rebuild the tree against the context's parameter registry
    ///
    /// Shared sub-trees stay shared in the copy. Caches start empty.
    pub fn deep_clone(self: &Arc<Self>, context: &mut CloneContext) -> Option<Arc<Node>> {
        let key = Arc::as_ptr(self) as usize;
        if let Some(existing) = context.clones.get(&key) {
            return Some(Arc::clone(existing));
        }

        let copy = match self.as_ref() {
            Node::Constant(node) => Node::Constant(node.duplicate()),
            Node::Parameter(node) => {
                let copy = ParameterNode::new(node.name(), &context.registry)?;
                if let Some(entry) = node.registry().entry(node.handle()) {
                    if !context.registry.adopt(copy.handle(), &entry) {
                        return None;
                    }
                }
                Node::Parameter(copy)
            }
            Node::Unary(node) => Node::Unary(node.deep_clone(context)?),
            Node::Binary(node) => Node::Binary(node.deep_clone(context)?),
            Node::Ternary(node) => Node::Ternary(node.deep_clone(context)?),
            Node::Function(node) => Node::Function(node.deep_clone(context)?),
        };

        let copy = Arc::new(copy);
        context.clones.insert(key, Arc::clone(&copy));
        Some(copy)
    }

    /// Number of distinct nodes reachable from this one
    pub fn distinct_nodes(self: &Arc<Self>) -> usize {
        fn visit(node: &Arc<Node>, seen: &mut Vec<usize>) {
            let key = Arc::as_ptr(node) as usize;
            if seen.contains(&key) {
                return;
            }
            seen.push(key);
            for child in node.children() {
                visit(child, seen);
            }
        }
        let mut seen = Vec::new();
        visit(self, &mut seen);
        seen.len()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(node) => match node.value() {
                Value::String(s) => write!(f, "{s:?}"),
                value => write!(f, "{value}"),
            },
            Node::Parameter(node) => write!(f, "{}", node.name()),
            Node::Unary(node) => write!(f, "({}{})", node.operator().symbol(), node.operand()),
            Node::Binary(node) => write!(
                f,
                "({} {} {})",
                node.left(),
                node.operator().symbol(),
                node.right()
            ),
            Node::Ternary(node) => {
                let [first, second, third] = node.operands();
                write!(
                    f,
                    "({first} {} {second} {} {third})",
                    node.operator().symbol(),
                    node.operator().second_symbol()
                )
            }
            Node::Function(node) => {
                write!(f, "{}(", node.function().name())?;
                for (index, argument) in node.arguments().iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// State carried through a deep clone
pub struct CloneContext {
    registry: Arc<ParameterRegistry>,
    clones: FxHashMap<usize, Arc<Node>>,
    specials: FxHashMap<SpecialObjectKind, SpecialObject>,
}

impl CloneContext {
    /// Clone into the given (unfrozen) registry
    pub fn new(registry: Arc<ParameterRegistry>) -> Self {
        Self {
            registry,
            clones: FxHashMap::default(),
            specials: FxHashMap::default(),
        }
    }

    /// The target registry
    pub fn registry(&self) -> &Arc<ParameterRegistry> {
        &self.registry
    }

    /// Fresh special object of the given kind, one per clone
    fn special(&mut self, kind: SpecialObjectKind) -> SpecialObject {
        self.specials
            .entry(kind)
            .or_insert_with(|| match kind {
                SpecialObjectKind::Random => SpecialObject::Random(RandomSource::new()),
            })
            .clone()
    }
}

/// How an operator or function constrains its operands
pub(crate) trait OperandRules {
    /// Types the operand at `position` may take
    fn allowed(&self, position: usize) -> SupportedValueTypes;
    /// Whether a numeric operand at `position` must be an integer
    fn integer(&self, position: usize) -> bool;
    /// Order in which to try types for undetermined operands
    fn preferred(&self) -> &[ValueType];
    /// Result type for the operand types; `None` rejects them
    fn result_type(&self, operands: &[TypeInfo]) -> Option<TypeInfo>;
}

fn settled(value_type: ValueType, integer: bool) -> TypeInfo {
    match value_type {
        ValueType::Numeric if integer => TypeInfo::INTEGER,
        other => TypeInfo::of(other),
    }
}

/// Check and settle operand types for a new composite node
///
/// Returns the node's result type, or `None` when no legal assignment exists.
/// Parameters may be narrowed even when `None` is returned; callers roll the
/// registry back on failure.
pub(crate) fn unify(operands: &[Arc<Node>], rules: &dyn OperandRules) -> Option<TypeInfo> {
    let mut hints: SmallVec<[ValueType; 4]> = SmallVec::new();
    let mut undetermined: SmallVec<[(usize, SupportedValueTypes); 3]> = SmallVec::new();

    for (position, operand) in operands.iter().enumerate() {
        let allowed = rules.allowed(position);
        match operand.operand_type() {
            OperandType::Known(info) => {
                if !allowed.supports(info.value_type) {
                    return None;
                }
                if rules.integer(position) && info.is_numeric() {
                    if info.numeric == NumericKind::Float {
                        return None;
                    }
                    if let Node::Parameter(parameter) = operand.as_ref() {
                        if !parameter.registry().require_integer(parameter.handle()) {
                            return None;
                        }
                    }
                }
                if !hints.contains(&info.value_type) {
                    hints.push(info.value_type);
                }
            }
            OperandType::Undetermined(supported) => {
                let options = supported & allowed;
                if options.is_empty() {
                    return None;
                }
                undetermined.push((position, options));
            }
        }
    }

    if !undetermined.is_empty() {
        let mut order: SmallVec<[ValueType; 8]> = SmallVec::new();
        for candidate in hints
            .iter()
            .chain(rules.preferred())
            .chain(ValueType::ALL.iter())
        {
            if !order.contains(candidate) {
                order.push(*candidate);
            }
        }

        let assignment = order.iter().find_map(|candidate| {
            let mut trial: SmallVec<[TypeInfo; 3]> =
                operands.iter().map(|operand| operand.return_type()).collect();
            let mut assignment: SmallVec<[(usize, ValueType); 3]> = SmallVec::new();
            for (position, options) in &undetermined {
                let value_type = if options.supports(*candidate) {
                    *candidate
                } else {
                    *order.iter().find(|t| options.supports(**t))?
                };
                trial[*position] = settled(value_type, rules.integer(*position));
                assignment.push((*position, value_type));
            }
            rules.result_type(&trial).map(|_| assignment)
        })?;

        for (position, value_type) in assignment {
            let Node::Parameter(parameter) = operands[position].as_ref() else {
                return None;
            };
            let registry = parameter.registry();
            if !registry.determine(parameter.handle(), value_type) {
                return None;
            }
            if value_type == ValueType::Numeric
                && rules.integer(position)
                && !registry.require_integer(parameter.handle())
            {
                return None;
            }
        }
    }

    let types: SmallVec<[TypeInfo; 3]> = operands.iter().map(|operand| operand.return_type()).collect();
    rules.result_type(&types)
}
