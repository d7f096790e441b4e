use crate::error::{Result, TachError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

pub type CallResult = anyhow::Result<Value>;

/// Anything that can sit in a member table and be invoked.
pub type Callable = Arc<dyn Fn(Call) -> CallResult + Send + Sync>;

/// Per-call hook that may rewrite the arguments and override the label.
pub type LabelTransform = Arc<dyn Fn(Arguments) -> Relabel + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            keyword: Map::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.insert(key.into(), value.into());
        self
    }

    /// Positional and keyword arguments as one JSON object, handy for echoing.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "args": self.positional,
            "kwargs": self.keyword,
        })
    }
}

/// Result of a label transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Relabel {
    pub args: Arguments,
    pub label: Option<String>,
}

impl Relabel {
    pub fn keep(args: Arguments) -> Self {
        Self { args, label: None }
    }

    pub fn with_label(args: Arguments, label: impl Into<String>) -> Self {
        Self {
            args,
            label: Some(label.into()),
        }
    }
}

/// Implicit first argument supplied by dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Receiver {
    None,
    Class(String),
    Instance(Value),
}

#[derive(Debug, Clone)]
pub struct Call {
    pub receiver: Receiver,
    pub args: Arguments,
}

impl Call {
    pub fn new(receiver: Receiver, args: Arguments) -> Self {
        Self { receiver, args }
    }

    pub fn instance(&self) -> Option<&Value> {
        match &self.receiver {
            Receiver::Instance(value) => Some(value),
            _ => None,
        }
    }

    pub fn class(&self) -> Option<&str> {
        match &self.receiver {
            Receiver::Class(path) => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Function,
    InstanceMethod,
    ClassMethod,
    StaticMethod,
    Data,
}

impl MemberKind {
    pub fn is_callable(&self) -> bool {
        !matches!(self, MemberKind::Data)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            MemberKind::Function => "function",
            MemberKind::InstanceMethod => "method",
            MemberKind::ClassMethod => "class method",
            MemberKind::StaticMethod => "static method",
            MemberKind::Data => "data",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Clone)]
enum MemberValue {
    Callable(Callable),
    Data(Value),
}

/// One entry of a module or class member table, tagged with its declared kind.
#[derive(Clone)]
pub struct Member {
    kind: MemberKind,
    value: MemberValue,
}

impl Member {
    pub fn from_callable(kind: MemberKind, callable: Callable) -> Self {
        Self {
            kind,
            value: MemberValue::Callable(callable),
        }
    }

    pub fn function<F>(f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        Self::from_callable(MemberKind::Function, Arc::new(f))
    }

    pub fn instance_method<F>(f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        Self::from_callable(MemberKind::InstanceMethod, Arc::new(f))
    }

    pub fn class_method<F>(f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        Self::from_callable(MemberKind::ClassMethod, Arc::new(f))
    }

    pub fn static_method<F>(f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        Self::from_callable(MemberKind::StaticMethod, Arc::new(f))
    }

    pub fn data(value: impl Into<Value>) -> Self {
        Self {
            kind: MemberKind::Data,
            value: MemberValue::Data(value.into()),
        }
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match &self.value {
            MemberValue::Callable(callable) => Some(callable),
            MemberValue::Data(_) => None,
        }
    }

    pub fn as_data(&self) -> Option<&Value> {
        match &self.value {
            MemberValue::Data(value) => Some(value),
            MemberValue::Callable(_) => None,
        }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            MemberValue::Callable(callable) => f
                .debug_struct("Member")
                .field("kind", &self.kind)
                .field("callable", &Arc::as_ptr(callable))
                .finish(),
            MemberValue::Data(value) => f
                .debug_struct("Member")
                .field("kind", &self.kind)
                .field("data", value)
                .finish(),
        }
    }
}

/// Identity comparison of two callables (same allocation).
pub fn same_callable(a: &Callable, b: &Callable) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    Module,
    Class,
}

struct Container {
    kind: ContainerKind,
    parent: Option<String>,
    members: HashMap<String, Member>,
}

/// Where a member was found along the inheritance chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub kind: MemberKind,
    pub owner: String,
    pub container: ContainerKind,
}

/// The member table entry an install pushed aside.
#[derive(Debug, Clone)]
pub enum Displaced {
    /// The member was declared on the patched container itself.
    Own(Member),
    /// The member was inherited; the patch added an override entry.
    Inherited,
}

/// Explicit descriptor table of instrumentable modules and classes.
///
/// Applications declare their targets here at startup and call through
/// [`TargetRegistry::call`] / [`TargetRegistry::call_method`]; installing a
/// binding swaps the member entry the call goes through. Concurrent
/// install/uninstall sequences on the same member are not coordinated.
#[derive(Default)]
pub struct TargetRegistry {
    containers: RwLock<HashMap<String, Container>>,
    helpers: RwLock<HashMap<(String, String), LabelTransform>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_module(&self, path: impl Into<String>) -> Declaration<'_> {
        self.declare(path.into(), ContainerKind::Module)
    }

    pub fn declare_class(&self, path: impl Into<String>) -> Declaration<'_> {
        self.declare(path.into(), ContainerKind::Class)
    }

    fn declare(&self, path: String, kind: ContainerKind) -> Declaration<'_> {
        self.containers
            .write()
            .entry(path.clone())
            .or_insert_with(|| Container {
                kind,
                parent: None,
                members: HashMap::new(),
            });

        Declaration {
            registry: self,
            path,
        }
    }

    pub fn define(&self, path: &str, name: impl Into<String>, member: Member) -> Result<()> {
        let mut containers = self.containers.write();
        if !containers.contains_key(path) {
            return Err(explain_missing(&containers, path));
        }
        if let Some(container) = containers.get_mut(path) {
            container.members.insert(name.into(), member);
        }
        Ok(())
    }

    pub fn register_transform<F>(&self, path: impl Into<String>, name: impl Into<String>, f: F)
    where
        F: Fn(Arguments) -> Relabel + Send + Sync + 'static,
    {
        self.helpers
            .write()
            .insert((path.into(), name.into()), Arc::new(f));
    }

    pub fn transform(&self, path: &str, name: &str) -> Result<LabelTransform> {
        self.helpers
            .read()
            .get(&(path.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| {
                TachError::resolution(
                    format!("{}.{}", path, name),
                    format!("'{}' has no label transform '{}'", path, name),
                )
            })
    }

    /// Resolve a dotted path to a declared module or class.
    pub fn resolve(&self, path: &str) -> Result<ContainerKind> {
        let containers = self.containers.read();
        containers
            .get(path)
            .map(|container| container.kind)
            .ok_or_else(|| explain_missing(&containers, path))
    }

    /// Classify `name` on `path`, searching the container's own table before
    /// its ancestors.
    pub fn classify(&self, path: &str, name: &str) -> Result<Classified> {
        let containers = self.containers.read();
        let (owner, member) = find(&containers, path, name)?;
        let container = containers
            .get(path)
            .map(|c| c.kind)
            .unwrap_or(ContainerKind::Module);

        Ok(Classified {
            kind: member.kind(),
            owner,
            container,
        })
    }

    /// The member a call on `path.name` currently dispatches to.
    pub fn lookup(&self, path: &str, name: &str) -> Result<Member> {
        let containers = self.containers.read();
        find(&containers, path, name).map(|(_, member)| member.clone())
    }

    pub fn current(&self, path: &str, name: &str) -> Result<Callable> {
        let member = self.lookup(path, name)?;
        member.as_callable().cloned().ok_or_else(|| {
            TachError::resolution(
                format!("{}.{}", path, name),
                format!("'{}' is data, not a callable", name),
            )
        })
    }

    /// True when `name` is declared directly on `path` (not inherited).
    pub fn declares(&self, path: &str, name: &str) -> bool {
        self.containers
            .read()
            .get(path)
            .map(|container| container.members.contains_key(name))
            .unwrap_or(false)
    }

    pub fn containers(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.containers.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Dispatch a call, supplying the implicit receiver the member's kind
    /// expects exactly once.
    pub fn invoke(
        &self,
        path: &str,
        name: &str,
        instance: Option<Value>,
        args: Arguments,
    ) -> CallResult {
        let member = self.lookup(path, name)?;
        let invocation_error = |reason: String| TachError::Invocation {
            path: path.to_string(),
            member: name.to_string(),
            reason,
        };

        let callable = member
            .as_callable()
            .cloned()
            .ok_or_else(|| invocation_error(format!("{} is not callable", member.kind())))?;

        let receiver = match member.kind() {
            MemberKind::InstanceMethod => match instance {
                Some(instance) => Receiver::Instance(instance),
                None => {
                    return Err(invocation_error(
                        "instance method called without an instance".to_string(),
                    )
                    .into())
                }
            },
            MemberKind::ClassMethod => Receiver::Class(path.to_string()),
            _ => Receiver::None,
        };

        callable(Call::new(receiver, args))
    }

    pub fn call(&self, path: &str, name: &str, args: Arguments) -> CallResult {
        self.invoke(path, name, None, args)
    }

    pub fn call_method(
        &self,
        path: &str,
        name: &str,
        instance: Value,
        args: Arguments,
    ) -> CallResult {
        self.invoke(path, name, Some(instance), args)
    }

    /// Replace the member `path.name` dispatches to with the one `wrap`
    /// builds from it. The replacement always lands in `path`'s own table.
    pub(crate) fn substitute<F>(&self, path: &str, name: &str, wrap: F) -> Result<Displaced>
    where
        F: FnOnce(&Member) -> Result<Member>,
    {
        let mut containers = self.containers.write();
        let (owner, current) = {
            let (owner, member) = find(&containers, path, name)?;
            (owner, member.clone())
        };

        let replacement = wrap(&current)?;
        let displaced = if owner == path {
            Displaced::Own(current)
        } else {
            Displaced::Inherited
        };

        if let Some(container) = containers.get_mut(path) {
            container.members.insert(name.to_string(), replacement);
        }

        Ok(displaced)
    }

    pub(crate) fn restore(&self, path: &str, name: &str, displaced: Displaced) {
        let mut containers = self.containers.write();
        if let Some(container) = containers.get_mut(path) {
            match displaced {
                Displaced::Own(member) => {
                    container.members.insert(name.to_string(), member);
                }
                Displaced::Inherited => {
                    container.members.remove(name);
                }
            }
        }
    }

    fn insert_member(&self, path: &str, name: String, member: Member) {
        if let Some(container) = self.containers.write().get_mut(path) {
            container.members.insert(name, member);
        }
    }

    fn set_parent(&self, path: &str, parent: String) {
        if let Some(container) = self.containers.write().get_mut(path) {
            container.parent = Some(parent);
        }
    }
}

fn explain_missing(containers: &HashMap<String, Container>, path: &str) -> TachError {
    match path.rsplit_once('.') {
        None => TachError::resolution(path, format!("no module named '{}'", path)),
        Some((parent, attr)) => match containers.get(parent) {
            Some(container) => match container.members.get(attr) {
                Some(member) => TachError::resolution(
                    path,
                    format!("'{}' is a {}, not a module or class", attr, member.kind()),
                ),
                None => TachError::resolution(
                    path,
                    format!("'{}' has no attribute '{}'", parent, attr),
                ),
            },
            None => TachError::resolution(path, explain_missing(containers, parent)),
        },
    }
}

fn find<'a>(
    containers: &'a HashMap<String, Container>,
    path: &str,
    name: &str,
) -> Result<(String, &'a Member)> {
    let mut current = path.to_string();
    let mut seen = HashSet::new();

    loop {
        if !seen.insert(current.clone()) {
            return Err(TachError::resolution(
                format!("{}.{}", path, name),
                format!("inheritance cycle through '{}'", current),
            ));
        }

        let container = match containers.get(&current) {
            Some(container) => container,
            None if current == path => return Err(explain_missing(containers, path)),
            None => {
                return Err(TachError::resolution(
                    format!("{}.{}", path, name),
                    format!("base class '{}' is not declared", current),
                ))
            }
        };

        if let Some(member) = container.members.get(name) {
            return Ok((current, member));
        }

        match &container.parent {
            Some(parent) => current = parent.clone(),
            None => {
                return Err(TachError::resolution(
                    format!("{}.{}", path, name),
                    format!("'{}' has no attribute '{}'", path, name),
                ))
            }
        }
    }
}

/// Builder returned by [`TargetRegistry::declare_module`] and
/// [`TargetRegistry::declare_class`].
pub struct Declaration<'a> {
    registry: &'a TargetRegistry,
    path: String,
}

impl<'a> Declaration<'a> {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn extends(self, parent: impl Into<String>) -> Self {
        self.registry.set_parent(&self.path, parent.into());
        self
    }

    pub fn member(self, name: impl Into<String>, member: Member) -> Self {
        self.registry.insert_member(&self.path, name.into(), member);
        self
    }

    pub fn function<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Member::function(f))
    }

    pub fn method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Member::instance_method(f))
    }

    pub fn class_method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Member::class_method(f))
    }

    pub fn static_method<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Call) -> CallResult + Send + Sync + 'static,
    {
        self.member(name, Member::static_method(f))
    }

    pub fn data(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, Member::data(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fake_registry() -> TargetRegistry {
        let registry = TargetRegistry::new();
        registry
            .declare_module("fake_module")
            .function("function", |call| Ok(call.args.to_value()));
        registry
            .declare_class("FakeClass")
            .method("instance_method", |call| {
                Ok(call.instance().cloned().unwrap_or(Value::Null))
            })
            .class_method("class_method", |call| Ok(json!(call.class())))
            .static_method("static_method", |call| {
                Ok(json!(call.receiver == Receiver::None))
            })
            .data("answer", 42);
        registry
            .declare_class("SubClass")
            .extends("FakeClass")
            .method("own_method", |_| Ok(json!("own")));
        registry
    }

    #[test]
    fn test_classify_declared_kinds() {
        let registry = fake_registry();

        let cases = [
            ("instance_method", MemberKind::InstanceMethod),
            ("class_method", MemberKind::ClassMethod),
            ("static_method", MemberKind::StaticMethod),
            ("answer", MemberKind::Data),
        ];
        for (name, kind) in cases {
            let classified = registry.classify("FakeClass", name).unwrap();
            assert_eq!(classified.kind, kind, "{}", name);
            assert_eq!(classified.owner, "FakeClass");
            assert_eq!(classified.container, ContainerKind::Class);
        }

        let function = registry.classify("fake_module", "function").unwrap();
        assert_eq!(function.kind, MemberKind::Function);
        assert_eq!(function.container, ContainerKind::Module);
    }

    #[test]
    fn test_classify_walks_inheritance_chain() {
        let registry = fake_registry();

        let inherited = registry.classify("SubClass", "class_method").unwrap();
        assert_eq!(inherited.kind, MemberKind::ClassMethod);
        assert_eq!(inherited.owner, "FakeClass");

        registry
            .declare_class("SubClass")
            .static_method("class_method", |_| Ok(Value::Null));
        let own = registry.classify("SubClass", "class_method").unwrap();
        assert_eq!(own.kind, MemberKind::StaticMethod);
        assert_eq!(own.owner, "SubClass");
    }

    #[test]
    fn test_inheritance_cycle_is_an_error() {
        let registry = TargetRegistry::new();
        registry.declare_class("A").extends("B");
        registry.declare_class("B").extends("A");

        let err = registry.classify("A", "missing").unwrap_err();
        assert!(err.is_resolution());
        assert!(err.to_string().contains("inheritance cycle"));
    }

    #[test]
    fn test_resolve_errors_name_path_and_cause() {
        let registry = fake_registry();

        assert_eq!(registry.resolve("FakeClass").unwrap(), ContainerKind::Class);

        let err = registry.resolve("nova").unwrap_err();
        assert_eq!(err.to_string(), "Could not load nova: no module named 'nova'");

        let err = registry.resolve("fake_module.Missing").unwrap_err();
        assert!(err.to_string().contains("'fake_module' has no attribute 'Missing'"));

        let err = registry.resolve("fake_module.function").unwrap_err();
        assert!(err.to_string().contains("is a function, not a module or class"));

        let err = registry.resolve("nova.compute.Manager").unwrap_err();
        match err {
            TachError::Resolution { path, cause } => {
                assert_eq!(path, "nova.compute.Manager");
                assert!(cause.contains("no module named 'nova'"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invoke_supplies_receiver_once() {
        let registry = fake_registry();

        let result = registry
            .call("SubClass", "class_method", Arguments::new())
            .unwrap();
        assert_eq!(result, json!("SubClass"));

        let result = registry
            .call("FakeClass", "static_method", Arguments::new())
            .unwrap();
        assert_eq!(result, json!(true));

        let result = registry
            .call_method("FakeClass", "instance_method", json!({"id": 7}), Arguments::new())
            .unwrap();
        assert_eq!(result, json!({"id": 7}));

        let result = registry
            .call(
                "fake_module",
                "function",
                Arguments::new().arg(1).kwarg("a", 4),
            )
            .unwrap();
        assert_eq!(result, json!({"args": [1], "kwargs": {"a": 4}}));
    }

    #[test]
    fn test_invoke_rejects_misuse() {
        let registry = fake_registry();

        let err = registry
            .call("FakeClass", "instance_method", Arguments::new())
            .unwrap_err();
        assert!(err.to_string().contains("without an instance"));

        let err = registry.call("FakeClass", "answer", Arguments::new()).unwrap_err();
        assert!(err.to_string().contains("data is not callable"));
    }

    #[test]
    fn test_define_member_after_declaration() {
        let registry = fake_registry();

        registry
            .define("SubClass", "late", Member::static_method(|_| Ok(json!("late"))))
            .unwrap();
        assert_eq!(
            registry.call("SubClass", "late", Arguments::new()).unwrap(),
            json!("late")
        );
        assert!(registry.classify("FakeClass", "late").is_err());

        let err = registry
            .define("nova.compute", "late", Member::data(1))
            .unwrap_err();
        assert!(err.is_resolution());
        assert!(err.to_string().contains("no module named 'nova'"));
    }

    #[test]
    fn test_substitute_and_restore_inherited_member() {
        let registry = fake_registry();
        let original = registry.current("FakeClass", "class_method").unwrap();

        let displaced = registry
            .substitute("SubClass", "class_method", |member| {
                Ok(Member::from_callable(
                    member.kind(),
                    Arc::new(|_| Ok(json!("patched"))),
                ))
            })
            .unwrap();
        assert!(matches!(displaced, Displaced::Inherited));
        assert!(registry.declares("SubClass", "class_method"));
        assert_eq!(
            registry.call("SubClass", "class_method", Arguments::new()).unwrap(),
            json!("patched")
        );
        assert_eq!(
            registry.call("FakeClass", "class_method", Arguments::new()).unwrap(),
            json!("FakeClass")
        );

        registry.restore("SubClass", "class_method", displaced);
        assert!(!registry.declares("SubClass", "class_method"));
        let restored = registry.current("SubClass", "class_method").unwrap();
        assert!(same_callable(&original, &restored));
    }

    #[test]
    fn test_transform_lookup() {
        let registry = fake_registry();
        registry.register_transform("helpers", "swap", |args| Relabel::with_label(args, "x"));

        let transform = registry.transform("helpers", "swap").unwrap();
        assert_eq!(transform(Arguments::new()).label.as_deref(), Some("x"));

        let err = match registry.transform("helpers", "missing") {
            Err(err) => err,
            Ok(_) => panic!("expected a resolution error"),
        };
        assert!(err.is_resolution());
    }
}
