pub mod binding;
pub mod catalog;
pub mod error;
pub mod notifiers;
pub mod statistics;
pub mod target;
pub mod value;

pub use binding::{BindingSpec, MethodBinding};
pub use catalog::Catalog;
pub use error::{Result, TachError};
pub use notifiers::{DynNotifier, FormatTable, Notifier, NotifierRegistry, NotifierSource};
pub use statistics::{Baton, DynStatistic, Statistic, StatisticRegistry};
pub use target::{
    Arguments, Call, CallResult, Callable, Member, MemberKind, Receiver, Relabel, TargetRegistry,
};
pub use value::{Measurement, MetricValue, Params, ValueKind};
