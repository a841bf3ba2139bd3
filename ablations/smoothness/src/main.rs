//! 平滑项权重消融实验.
//!
//! 在合成体模上以不同的一阶/二阶边权重运行肺部分割, 对比 Dice 系数.

mod result;
mod runner;

fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .env()
        .init()
        .expect("Logger initialization error");

    runner::run().analyze();
}
