fn main() {
    built::write_built_file().expect("Falha ao obter informações de build");
}
