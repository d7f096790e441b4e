use serde::Serialize;
use serde_json::{json, Value};
use std::thread;
use std::time::Duration;
use tach_core::{Arguments, Relabel, TargetRegistry};
use tracing::debug;

pub const INVENTORY: &str = "demo.inventory";
pub const CART: &str = "demo.Cart";
pub const GIFT_CART: &str = "demo.GiftCart";
pub const HELPERS: &str = "demo.helpers";

const CHECKOUT_DELAY: Duration = Duration::from_millis(20);

/// Declare the sample shop application on `targets`.
pub fn register_demo(targets: &TargetRegistry) {
    targets
        .declare_module(INVENTORY)
        .function("lookup", |call| {
            let sku = call
                .args
                .positional
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow::anyhow!("lookup requires a sku"))?;
            Ok(json!({ "sku": sku, "stock": stock_for(sku) }))
        })
        .function("restock", |call| {
            let quantity = call
                .args
                .keyword
                .get("quantity")
                .and_then(Value::as_i64)
                .unwrap_or(1);
            Ok(json!(quantity))
        })
        .function("discontinue", |call| {
            Err(anyhow::anyhow!(
                "cannot discontinue {}",
                call.args.to_value()["args"][0]
            ))
        });

    targets
        .declare_class(CART)
        .method("add_item", |call| {
            let cart = call.instance().cloned().unwrap_or(Value::Null);
            Ok(json!({ "cart": cart, "added": call.args.positional }))
        })
        .method("checkout", |call| {
            thread::sleep(CHECKOUT_DELAY);
            Ok(json!({ "cart": call.instance(), "status": "paid" }))
        })
        .class_method("create", |call| Ok(json!({ "class": call.class() })))
        .static_method("tax_rate", |_| Ok(json!(0.2)))
        .data("currency", "EUR");

    targets
        .declare_class(GIFT_CART)
        .extends(CART)
        .method("wrap", |call| {
            Ok(json!({ "cart": call.instance(), "wrapped": true }))
        });

    targets.declare_module(HELPERS);
    targets.register_transform(HELPERS, "by_sku", by_sku);

    debug!("Registered demo targets");
}

/// Report lookups per sku: `demo.inventory.<sku>`.
fn by_sku(args: Arguments) -> Relabel {
    let label = args
        .positional
        .first()
        .and_then(Value::as_str)
        .map(|sku| format!("{}.{}", INVENTORY, sku));

    match label {
        Some(label) => Relabel::with_label(args, label),
        None => Relabel::keep(args),
    }
}

fn stock_for(sku: &str) -> usize {
    sku.bytes().map(usize::from).sum::<usize>() % 17
}

/// Outcome of one call made by [`exercise`].
#[derive(Debug, Clone, Serialize)]
pub struct Exercise {
    pub target: String,
    pub result: Result<Value, String>,
}

/// Call every demo target once per iteration, the way an application would.
pub fn exercise(targets: &TargetRegistry, iterations: usize) -> Vec<Exercise> {
    let mut outcomes = Vec::new();

    for round in 0..iterations {
        let sku = format!("sku-{}", round + 1);
        let cart = json!({ "id": round + 1 });

        let calls = [
            (INVENTORY, "lookup", None, Arguments::new().arg(sku.as_str())),
            (INVENTORY, "restock", None, Arguments::new().kwarg("quantity", 3)),
            (INVENTORY, "discontinue", None, Arguments::new().arg(sku.as_str())),
            (CART, "create", None, Arguments::new()),
            (CART, "add_item", Some(cart.clone()), Arguments::new().arg(sku.as_str()).arg(2)),
            (CART, "tax_rate", None, Arguments::new()),
            (GIFT_CART, "create", None, Arguments::new()),
            (GIFT_CART, "wrap", Some(cart.clone()), Arguments::new()),
            (GIFT_CART, "checkout", Some(cart), Arguments::new()),
        ];

        for (path, member, instance, args) in calls {
            let result = targets
                .invoke(path, member, instance, args)
                .map_err(|e| e.to_string());
            outcomes.push(Exercise {
                target: format!("{}.{}", path, member),
                result,
            });
        }
    }

    outcomes
}
