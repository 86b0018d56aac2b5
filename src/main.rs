fn main() {
    hdrinc::cli::run();
}
