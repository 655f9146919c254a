use std::env;
use std::fs;
use std::path::Path;

/// Default number of slots in the lock table: one page of words on 32-bit.
const DEFAULT_SLOT_COUNT: usize = 1 << 10;

fn main() {
	println!("cargo:rerun-if-env-changed=KATOMIC_SLOT_COUNT");
	println!("cargo:rerun-if-changed=build.rs");

	let count = match env::var("KATOMIC_SLOT_COUNT") {
		Ok(raw) => raw
			.trim()
			.parse::<usize>()
			.unwrap_or_else(|_| panic!("KATOMIC_SLOT_COUNT must be an integer, got {raw:?}")),
		Err(_) => DEFAULT_SLOT_COUNT,
	};
	assert!(
		count.is_power_of_two(),
		"KATOMIC_SLOT_COUNT must be a power of two, got {count}"
	);

	let out_dir = env::var("OUT_DIR").expect("cargo must set OUT_DIR for build scripts");
	let path = Path::new(&out_dir).join("slot_count.rs");
	fs::write(&path, format!("{count}\n")).expect("failed to write slot_count.rs");
}
