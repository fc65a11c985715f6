//! Keyed list demo.
//!
//! Renders a todo list component into the in-memory host, reorders and
//! mutates it through signals, and prints the markup plus the host
//! operations each flush cost.
//!
//! Run with: cargo run --example keyed_list --features log-subscriber

use spark_vdom::component::functional_component;
use spark_vdom::reactive::signal;
use spark_vdom::renderer::{MemoryAdapter, Renderer};
use spark_vdom::scheduler::flush_jobs;
use spark_vdom::vnode::{element, h, Props, VNode};

fn main() -> spark_vdom::Result<()> {
    #[cfg(feature = "log-subscriber")]
    spark_vdom::logging::init_logging();

    let items = signal(vec!["write", "test", "ship", "rest"]);

    let list = {
        let items = items.clone();
        functional_component("TodoList", move |_| {
            let rows: Vec<VNode> = items
                .get()
                .into_iter()
                .map(|item| element("li").key(item).children(item).build())
                .collect();
            Ok(h("ul", Props::new(), rows))
        })
    };

    let mut adapter = MemoryAdapter::new();
    let root = adapter.create_root();
    let renderer = Renderer::new(adapter);

    renderer.render(Some(h("main", Props::new(), vec![spark_vdom::h_component(&list, Props::new(), ())])), root)?;
    report(&renderer, root, "mount");

    items.update(|list| list.swap(1, 2));
    flush_jobs();
    report(&renderer, root, "swap");

    items.update(|list| list.reverse());
    flush_jobs();
    report(&renderer, root, "reverse");

    items.update(|list| {
        list.retain(|item| *item != "rest");
        list.insert(0, "plan");
    });
    flush_jobs();
    report(&renderer, root, "insert + remove");

    renderer.render(None, root)?;
    report(&renderer, root, "unmount");
    Ok(())
}

fn report(renderer: &Renderer<MemoryAdapter>, root: spark_vdom::HostNode, step: &str) {
    renderer.with_adapter_mut(|adapter| {
        println!(
            "{step:>16}: {} ({} ops, {} moves)",
            adapter.inner_markup(root),
            adapter.ops().len(),
            adapter.move_count()
        );
        adapter.clear_ops();
    });
}
