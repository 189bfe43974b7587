//! Frame monitoring core: a bounded frame queue feeding a deterministic
//! template comparison engine, an IDLE/ACTIVE detection state machine and
//! count-bounded artifact retention, with atomic profile switching.

pub mod shared {
    pub mod clock;
    pub mod constants;
    pub mod frame;
    pub mod region;
}

pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod frame_queue;
    pub mod infrastructure;
}

pub mod comparison {
    pub mod domain {
        pub mod feature_map;
        pub mod frame_comparator;
        pub mod reference;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod detection_event;
        pub mod detection_state_machine;
        pub mod notifier;
    }
    pub mod infrastructure {
        pub mod log_notifier;
    }
}

pub mod artifacts {
    pub mod domain {
        pub mod artifact;
        pub mod artifact_manager;
        pub mod artifact_store;
        pub mod debug_overlay;
        pub mod retention_ledger;
    }
    pub mod infrastructure;
}

pub mod profile {
    pub mod domain {
        pub mod metadata_store;
        pub mod profile_context;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod compare_image_use_case;
    pub mod metrics;
    pub mod monitor_config;
    pub mod monitor_pipeline;
    pub mod monitor_use_case;
    pub mod monitoring_state;
    pub mod pipeline_logger;
    pub mod infrastructure {
        pub mod threaded_monitor;
    }
}
