use log::info;
use mkbox::SystemCapabilities;
use mkbox::core::util;

pub fn check_requirements() -> bool {
    info!("Checking sandbox requirements");
    println!("Checking sandbox requirements...\n");

    let caps = SystemCapabilities::detect();
    println!("{}", caps.summary());

    if caps.can_build_sandbox() {
        println!("\n[ok] A sandbox can be built on this host");
    } else {
        println!("\n[--] Neither root nor unprivileged user namespaces are available");
    }

    println!("\nSystem info:");
    println!("  UID: {}", util::get_uid());
    println!("  GID: {}", util::get_gid());

    caps.can_build_sandbox()
}
