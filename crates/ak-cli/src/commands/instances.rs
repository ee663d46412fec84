use ak_core::config::Config;

pub fn run(config: &Config) {
    if config.instances.is_empty() {
        println!("No instances configured. Add [[instances]] entries to {}.", Config::default_path().display());
        return;
    }

    println!("{:<12} {:<20} {:<22} {:>8} {:>7}", "ID", "NAME", "SERIAL", "ENTITIES", "ENABLED");
    for instance in &config.instances {
        println!(
            "{:<12} {:<20} {:<22} {:>8} {:>7}",
            instance.id,
            instance.display_name(),
            instance.adb_serial,
            instance.entity_count,
            if instance.enabled { "yes" } else { "no" }
        );
    }
}
