fn main() {
    if let Err(e) = comterm_lib::run() {
        eprintln!("comterm: {}", e);
        std::process::exit(1);
    }
}
