fn main() -> Result<(), Box<dyn std::error::Error>> {
    charla::cli::main()
}
