//! Batch face extraction and one-to-many face verification.
//!
//! The `detection` module holds the backend contracts and the bundled ONNX
//! backend, `pipeline` the batch use cases, and `host` the tensor-batch
//! surface used by node-graph hosts.

pub mod detection {
    pub mod domain {
        pub mod backend_error;
        pub mod face_detector;
        pub mod face_verifier;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod extract_faces_use_case;
    pub mod face_image;
    pub mod pipeline_logger;
    pub mod probe_aggregate;
    pub mod result_assembly;
    pub mod verify_faces_use_case;
}

pub mod host;

pub mod shared {
    pub mod backend_home;
    pub mod backend_identity;
    pub mod constants;
    pub mod image;
    pub mod model_resolver;
    pub mod settings;
}
