//! Shared fixtures: a simulated target process and a scripted toolchain

// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use hotswap::command::Addr;
use hotswap::engine::{ReloadEvent, ReloadObserver};
use hotswap::loader::{FakeImageHost, RawSymbol};
use hotswap::patcher::MemorySlots;
use hotswap::sweeper::{Obj, Reflectable};

// Simulated address layout of the "running process".
pub const RENDER_V0: Addr = Addr(0x1000);
pub const WIDGET_TABLE_V0: Addr = Addr(0x1100);
pub const LAYOUT_V0: Addr = Addr(0x1010);
pub const MEASURE_V0: Addr = Addr(0x1020);
pub const CALLSITE: Addr = Addr(0x500);
pub const WIDGET_SIZE: u64 = 0x38;

pub const WORD: usize = std::mem::size_of::<usize>();

/// Write an executable shell script that emulates a compiler/linker: it
/// parses `-o OUT` from its arguments and writes a marker file there.
pub fn fake_cc(dir: &Path) -> PathBuf {
    let path = dir.join("cc");
    fs::write(
        &path,
        "#!/bin/sh\n\
         out=\"\"; prev=\"\"\n\
         for arg in \"$@\"; do [ \"$prev\" = \"-o\" ] && out=\"$arg\"; prev=\"$arg\"; done\n\
         [ -n \"$out\" ] && echo built > \"$out\"\n",
    )
    .unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// Write a build log recording that `cc` compiled `source`.
pub fn write_build_log(logs: &Path, cc: &Path, source: &Path) {
    fs::create_dir_all(logs).unwrap();
    fs::write(
        logs.join("build1.log"),
        format!(
            "cd {dir}\n{cc} -c {src} -O1 -o {dir}/full-build.o\n",
            dir = logs.display(),
            cc = cc.display(),
            src = source.display(),
        ),
    )
    .unwrap();
}

/// The simulated process: base symbols in the fake host and the dispatch
/// slots the patch engine will read and write.
pub fn base_process() -> (FakeImageHost, MemorySlots) {
    let mut host = FakeImageHost::new();
    host.define_base_symbol("widget_render", RENDER_V0);
    host.define_base_symbol_sized("Widget.type", WIDGET_TABLE_V0, WIDGET_SIZE);

    let mut slots = MemorySlots::new();
    // Widget's table: [render, layout, measure]
    slots.set(WIDGET_TABLE_V0, RENDER_V0);
    slots.set(Addr(WIDGET_TABLE_V0.0 + WORD), LAYOUT_V0);
    slots.set(Addr(WIDGET_TABLE_V0.0 + 2 * WORD), MEASURE_V0);
    // One call site in the base image dispatching to widget_render.
    slots.set(CALLSITE, RENDER_V0);
    (host, slots)
}

/// Register generation `n`'s module in the fake host: a rebuilt
/// `widget_render`, a rebuilt `Widget.type`, and the module's new table
/// contents in the slot memory.
pub fn register_generation(
    host: &mut FakeImageHost,
    slots: &mut MemorySlots,
    build_dir: &Path,
    n: u64,
) -> (Addr, Addr) {
    let render = Addr(0x2000 + (n as usize) * 0x1000);
    let table = Addr(0x2100 + (n as usize) * 0x1000);
    host.register_image(
        build_dir.join(format!("reload{n}.so")),
        vec![
            RawSymbol::new("widget_render", render, 'T'),
            RawSymbol::new("Widget.type", table, 'D').with_size(WIDGET_SIZE),
        ],
    );
    // New table: render overridden, layout and measure inherited.
    slots.set(table, render);
    slots.set(Addr(table.0 + WORD), LAYOUT_V0);
    slots.set(Addr(table.0 + 2 * WORD), MEASURE_V0);
    (render, table)
}

/// An application object the sweep can reach.
pub struct Widget {
    symbol: &'static str,
    children: RefCell<Vec<Obj>>,
    pub reloads: Cell<usize>,
}

impl Widget {
    pub fn new(symbol: &'static str) -> Rc<Self> {
        Rc::new(Self {
            symbol,
            children: RefCell::new(Vec::new()),
            reloads: Cell::new(0),
        })
    }

    pub fn attach(self: &Rc<Self>, child: Obj) {
        self.children.borrow_mut().push(child);
    }
}

impl Reflectable for Widget {
    fn type_symbol(&self) -> &str {
        self.symbol
    }

    fn children(&self) -> Vec<Obj> {
        self.children.borrow().clone()
    }

    fn reloaded(&self) {
        self.reloads.set(self.reloads.get() + 1);
    }
}

/// Observer that records every event name in order.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl ReloadObserver for EventLog {
    fn on_event(&self, event: &ReloadEvent) {
        let name = match event {
            ReloadEvent::Started { .. } => "started",
            ReloadEvent::Built { .. } => "built",
            ReloadEvent::Loaded { .. } => "loaded",
            ReloadEvent::Patched { .. } => "patched",
            ReloadEvent::Swept { .. } => "swept",
            ReloadEvent::Completed { .. } => "completed",
            ReloadEvent::Failed { .. } => "failed",
        };
        self.events.borrow_mut().push(name.to_string());
    }
}
