fn main() {
    if let Err(err) = phylo_scene::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
