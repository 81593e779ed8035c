use std::io::Write;

use hookline_debugger::{Registers, Termination};
use hookline_symbol::{AddressRange, SymbolTable};
use kdl::{KdlDocument, KdlEntry, KdlNode};

/// KDL node describing a breakpoint hit.
pub fn hit_node(location: &str, addr: u64, count: u64, registers: Option<&Registers>) -> KdlNode {
    let mut node = KdlNode::new("hit");

    node.entries_mut().push(KdlEntry::new(location));
    node.entries_mut()
        .push(KdlEntry::new_prop("addr", format!("{addr:#x}")));
    node.entries_mut()
        .push(KdlEntry::new_prop("count", i128::from(count)));

    if let Some(registers) = registers {
        let children = node.ensure_children();

        for (name, value) in registers.general_purpose() {
            let mut reg_node = KdlNode::new(name);
            reg_node.entries_mut().push(KdlEntry::new(format!("{value:#x}")));
            children.nodes_mut().push(reg_node);
        }
    }

    node
}

/// KDL node describing how the program ended.
pub fn termination_node(termination: &Termination) -> KdlNode {
    match termination {
        Termination::Exited(code) => {
            let mut node = KdlNode::new("exited");
            node.entries_mut().push(KdlEntry::new(i128::from(*code)));
            node
        }
        Termination::Signaled(signal) => {
            let mut node = KdlNode::new("signaled");
            node.entries_mut().push(KdlEntry::new(signal.as_str()));
            node
        }
        Termination::Aborted { breakpoint, .. } => {
            let mut node = KdlNode::new("aborted");
            node.entries_mut()
                .push(KdlEntry::new_prop("breakpoint", breakpoint.to_string()));
            node
        }
    }
}

/// KDL document describing a symbol table.
pub fn symbols_document(table: &SymbolTable) -> KdlDocument {
    let mut kdl = KdlDocument::new();

    for file in table.files() {
        let mut file_node = KdlNode::new("file");
        file_node.entries_mut().push(KdlEntry::new(file.name.as_str()));
        file_node
            .entries_mut()
            .push(KdlEntry::new_prop("low", format!("{:#x}", file.low())));
        file_node
            .entries_mut()
            .push(KdlEntry::new_prop("high", format!("{:#x}", file.high())));

        let mut functions = file.functions.values().collect::<Vec<_>>();
        functions.sort_by_key(|f| f.low_pc);

        for func in functions {
            let mut func_node = KdlNode::new("function");
            func_node.entries_mut().push(KdlEntry::new(func.name.as_str()));
            func_node
                .entries_mut()
                .push(KdlEntry::new_prop("addr", format!("{:#x}", func.address())));
            func_node
                .entries_mut()
                .push(KdlEntry::new_prop("size", i128::from(func.size())));
            func_node
                .entries_mut()
                .push(KdlEntry::new_prop("line", i128::from(func.decl_line)));

            file_node.ensure_children().nodes_mut().push(func_node);
        }

        kdl.nodes_mut().push(file_node);
    }

    kdl
}

/// Writes a single node as a formatted KDL document.
pub fn write_node(mut output: impl Write, node: KdlNode) -> std::io::Result<()> {
    let mut kdl = KdlDocument::new();
    kdl.nodes_mut().push(node);
    kdl.autoformat();

    output.write_all(kdl.to_string().as_bytes())?;
    output.flush()
}
