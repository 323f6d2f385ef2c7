use std::path::{Path, PathBuf};
use std::sync::Arc;

use burn::backend::wgpu::WgpuDevice;
use burn::backend::{Autodiff, Wgpu};
use burn::module::AutodiffModule;
use burn::prelude::Backend;
use log::info;

use cifarnet_core::error::{PipelineError, Result};
use cifarnet_core::model::Model;
use cifarnet_models::ai::deep::DeepNetConfig;
use cifarnet_models::ai::evaluator::{Evaluator, Metrics};
use cifarnet_models::ai::loss::ClassificationLoss;
use cifarnet_models::ai::network::{Classifier, NetworkKind};
use cifarnet_models::ai::shallow::ShallowNetConfig;
use cifarnet_models::ai::trainer::{Trainer, TrainingConfig};
use cifarnet_models::data::cifar::{BatchType, CifarBatcher, CifarDataset, NUM_CLASSES};
use cifarnet_models::data::provider::{BatchOrder, BatchProvider};
use cifarnet_output::console::{accuracy_line, ConsoleRenderer};
use cifarnet_output::logger::initiate_logger;

use crate::session::config::{BaseConfig, BaseConfigReader, RunSettings};

pub type CifarBackend = Wgpu<f32, i32>;
pub type CifarAdBackend = Autodiff<CifarBackend>;

pub struct SessionBuilder {
    base_config: BaseConfig,
    config_path: PathBuf,
    device: WgpuDevice,
}

impl SessionBuilder {
    pub(crate) fn new(base_config_file: &str) -> Result<Self> {
        let config_file = Path::new(base_config_file);
        if !config_file.exists() {
            return Err(PipelineError::Config(format!(
                "configuration file {} is not found",
                base_config_file
            )));
        }
        let config_path = config_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let base_config = BaseConfigReader::new(base_config_file).parse()?;
        Ok(Self {
            base_config,
            config_path,
            device: WgpuDevice::BestAvailable,
        })
    }

    /// Starts the logger and loads both splits. Nothing is trained yet.
    pub(crate) fn build(self) -> Result<Session> {
        initiate_logger(&self.config_path, &self.base_config.log_settings)?;

        let data_settings = &self.base_config.data_settings;
        info!("Reading {} from the dataset cache", data_settings.dataset);
        let train = CifarDataset::load(
            &data_settings.dataset,
            BatchType::Train,
            data_settings.train_limit,
        )?;
        let test = CifarDataset::load(
            &data_settings.dataset,
            BatchType::Test,
            data_settings.test_limit,
        )?;

        Ok(Session {
            runs: self.base_config.runs,
            train: Arc::new(train),
            test: Arc::new(test),
            device: self.device,
        })
    }
}

/// Loaded data plus the list of networks to train on it, one after the other.
pub struct Session {
    runs: Vec<RunSettings>,
    train: Arc<CifarDataset>,
    test: Arc<CifarDataset>,
    device: WgpuDevice,
}

impl Session {
    pub(crate) fn run(&self) -> Result<Vec<Metrics>> {
        self.runs.iter().map(|run| self.run_network(run)).collect()
    }

    fn run_network(&self, run: &RunSettings) -> Result<Metrics> {
        let network = run.trainer_settings.network;
        let config = TrainingConfig::with_settings(&run.trainer_settings);
        info!("Starting {} run with {:?}", network, config);
        CifarAdBackend::seed(config.seed);

        match network {
            NetworkKind::Shallow => {
                let model = ShallowNetConfig::new().init::<CifarAdBackend>(&self.device)?;
                self.train_and_evaluate(model, network, &config, run.report_every())
            }
            NetworkKind::Deep => {
                let model = DeepNetConfig::new().init::<CifarAdBackend>(&self.device)?;
                self.train_and_evaluate(model, network, &config, run.report_every())
            }
        }
    }

    fn train_and_evaluate<M>(
        &self,
        model: M,
        network: NetworkKind,
        config: &TrainingConfig,
        report_every: usize,
    ) -> Result<Metrics>
    where
        M: Classifier<CifarAdBackend> + AutodiffModule<CifarAdBackend>,
        M::InnerModule: Classifier<CifarBackend>,
    {
        let mut train_provider = BatchProvider::new(
            Arc::clone(&self.train),
            CifarBatcher::<CifarAdBackend>::new(self.device.clone()),
            config.batch_size,
            BatchOrder::Shuffled { seed: config.seed },
        )?;
        let mut trainer = Trainer::builder()
            .optim(config.optimizer.init::<CifarAdBackend, M>())
            .loss(ClassificationLoss::new(NUM_CLASSES, &self.device))
            .num_epochs(config.num_epochs)
            .renderer(ConsoleRenderer::stdout(report_every))
            .build();
        let model = trainer.fit(model, &mut train_provider)?;
        info!("Finished training after {} updates", trainer.state().steps);

        let mut test_provider = BatchProvider::new(
            Arc::clone(&self.test),
            CifarBatcher::<CifarBackend>::new(self.device.clone()),
            config.batch_size,
            BatchOrder::Sequential,
        )?;
        let metrics = Evaluator::new(NUM_CLASSES).run(&model.valid(), &mut test_provider)?;
        println!("{}", accuracy_line(network, &metrics));
        Ok(metrics)
    }
}
