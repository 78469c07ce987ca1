fn main() {
    paper_merger::run();
}
