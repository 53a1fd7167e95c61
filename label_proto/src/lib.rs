tonic::include_proto!("labels");
