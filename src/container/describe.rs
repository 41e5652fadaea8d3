//! Rendering of binding tables

use super::tree::EntryStack;
use crate::{binding::describe, key::Key};
use std::collections::BTreeMap;

/// One line per key, `bind<Foo>() { singleton { Foo } }`, grouped by the module that registered it
pub(crate) fn describe_bindings<'a>(
    entries: impl Iterator<Item = (&'a Key, &'a EntryStack)>,
    qualified: bool,
    with_overrides: bool,
    indent: usize,
) -> String {
    let mut root = Vec::new();
    let mut modules: BTreeMap<&str, Vec<_>> = BTreeMap::new();
    for (key, stack) in entries {
        let Some(active) = stack.first() else { continue };
        match active.from_module.as_deref() {
            Some(module) => modules.entry(module).or_default().push((key, stack)),
            None => root.push((key, stack)),
        }
    }

    let mut out = String::new();
    append_bindings(&mut out, &root, qualified, with_overrides, indent);
    for (module, entries) in modules {
        out.push_str(&format!("{}module {module} {{\n", " ".repeat(indent)));
        append_bindings(&mut out, &entries, qualified, with_overrides, indent + 4);
        out.push_str(&format!("{}}}\n", " ".repeat(indent)));
    }
    out
}

fn append_bindings(out: &mut String, entries: &[(&Key, &EntryStack)], qualified: bool, with_overrides: bool, indent: usize) {
    for (key, stack) in entries {
        let key_description = key.render_bind(qualified);
        out.push_str(&" ".repeat(indent));
        out.push_str(&key_description);
        out.push_str(" { ");
        out.push_str(&describe(stack[0].binding.as_ref(), qualified));
        out.push_str(" }\n");
        if with_overrides {
            let sub_indent = indent + key_description.len().saturating_sub(4);
            for overridden in stack.iter().skip(1) {
                out.push_str(&" ".repeat(sub_indent));
                out.push_str("overrides ");
                out.push_str(&describe(overridden.binding.as_ref(), qualified));
                out.push('\n');
            }
        }
    }
}
